use crate::Result;
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub mod ts;

/// Append-only destination for reassembled payload units.
///
/// Each completed unit is handed over in a single call, in stream order.
#[async_trait::async_trait]
pub trait UnitSink: Send {
    /// Append one unit's payload
    async fn write_unit(&mut self, data: &[u8]) -> Result<()>;

    /// Flush anything buffered by the sink
    async fn flush(&mut self) -> Result<()>;
}

#[async_trait::async_trait]
impl<W: AsyncWrite + Unpin + Send> UnitSink for W {
    async fn write_unit(&mut self, data: &[u8]) -> Result<()> {
        self.write_all(data).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        AsyncWriteExt::flush(self).await?;
        Ok(())
    }
}

pub mod tests {
    use super::*;

    /// A sink that records every unit it receives
    #[derive(Debug, Default)]
    pub struct CollectingSink {
        pub units: Vec<Vec<u8>>,
    }

    impl CollectingSink {
        pub fn new() -> Self {
            Self { units: Vec::new() }
        }

        /// Total bytes received across all units
        pub fn total_bytes(&self) -> usize {
            self.units.iter().map(Vec::len).sum()
        }
    }

    #[async_trait::async_trait]
    impl UnitSink for CollectingSink {
        async fn write_unit(&mut self, data: &[u8]) -> Result<()> {
            self.units.push(data.to_vec());
            Ok(())
        }

        async fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }
}

pub use self::ts::{AssemblerResult, PesAssembler, PidExtractor};
