use crate::errors::PipelineError;
use crate::pipeline::{BufferReader, BufferWriter, Stage, StageContext};

/// Hands every item to a callback, then passes it through unchanged.
///
/// Used to print intermediate values; place it anywhere in a pipeline
/// without changing the item type.
pub struct Sink<T, F> {
    name: String,
    observe: F,
    _phantom: std::marker::PhantomData<fn(T)>,
}

impl<T, F> Sink<T, F>
where
    F: Fn(&T) + Send + Sync,
{
    pub fn new(name: impl Into<String>, observe: F) -> Self {
        Self {
            name: name.into(),
            observe,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T, F> Stage for Sink<T, F>
where
    T: Send + 'static,
    F: Fn(&T) + Send + Sync,
{
    type Input = T;
    type Output = T;

    fn name(&self) -> &str {
        &self.name
    }

    fn run(
        &self,
        input: &BufferReader<T>,
        output: &BufferWriter<T>,
        ctx: &StageContext<'_>,
    ) -> Result<(), PipelineError> {
        for item in input.iter(ctx.cancel()) {
            let item = item?;
            (self.observe)(&item);
            ctx.emit(output, item)?;
        }
        Ok(())
    }
}
