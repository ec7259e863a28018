use crate::error::Error;

/// Sequential line sink.
///
/// Lines are expected to carry their terminator. Implementors writing to files add a missing
/// final `\n` so that consecutive lines never get merged.
pub trait WriteLine {
    fn write_line(&mut self, line: &str) -> Result<(), Error>;

    /// Flushes and closes the underlying resources.
    fn finish(self) -> Result<(), Error>
    where
        Self: Sized,
    {
        Ok(())
    }
}

impl WriteLine for Vec<String> {
    fn write_line(&mut self, line: &str) -> Result<(), Error> {
        self.push(line.to_string());
        Ok(())
    }
}

impl<W: WriteLine + ?Sized> WriteLine for &mut W {
    fn write_line(&mut self, line: &str) -> Result<(), Error> {
        (**self).write_line(line)
    }
}
