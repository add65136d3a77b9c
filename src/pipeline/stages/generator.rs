use crate::errors::PipelineError;
use crate::pipeline::{BufferReader, BufferWriter, Stage, StageContext};

/// Emits a fixed sequence of values, ignoring its (empty) input.
#[derive(Debug, Clone)]
pub struct Generator<T> {
    values: Vec<T>,
}

impl<T> Generator<T> {
    pub fn new(values: Vec<T>) -> Self {
        Self { values }
    }
}

impl<T> Stage for Generator<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Input = ();
    type Output = T;

    fn name(&self) -> &str {
        "Generator"
    }

    fn run(
        &self,
        _input: &BufferReader<()>,
        output: &BufferWriter<T>,
        ctx: &StageContext<'_>,
    ) -> Result<(), PipelineError> {
        for value in &self.values {
            ctx.emit(output, value.clone())?;
        }
        Ok(())
    }
}
