//! Reader discovery

use pcsc::{Context, ReaderState, Scope, State};
use tracing::debug;

use crate::{
    config::{ConnectStrategy, PcscConfig},
    error::PcscError,
    reader::PcscReader,
    transport::PcscTransport,
};

/// Entry point to the PC/SC service
#[allow(missing_debug_implementations)]
pub struct PcscDeviceManager {
    context: Context,
}

impl PcscDeviceManager {
    /// Establish a PC/SC context
    pub fn new() -> Result<Self, PcscError> {
        let context = Context::establish(Scope::User)?;
        Ok(Self { context })
    }

    /// Every attached reader with its card, if any
    pub fn list_readers(&self) -> Result<Vec<PcscReader>, PcscError> {
        let names = self.context.list_readers_owned()?;
        if names.is_empty() {
            return Err(PcscError::NoReadersAvailable);
        }

        let mut states: Vec<_> = names
            .iter()
            .map(|name| ReaderState::new(name.as_c_str(), State::UNAWARE))
            .collect();

        match self.context.get_status_change(None, &mut states) {
            Ok(()) => Ok(states.iter().map(PcscReader::from_reader_state).collect()),
            Err(e) => {
                debug!(error = %e, "Reader status unavailable, reporting empty readers");
                Ok(names
                    .iter()
                    .map(|name| PcscReader::new(name.to_string_lossy().into_owned(), false, None))
                    .collect())
            }
        }
    }

    /// The reader a strategy designates
    pub fn find_reader(&self, strategy: &ConnectStrategy) -> Result<PcscReader, PcscError> {
        let readers = self.list_readers()?;
        match strategy {
            ConnectStrategy::Reader(name) => readers
                .into_iter()
                .find(|r| r.name() == name)
                .ok_or_else(|| PcscError::ReaderNotFound(name.clone())),
            ConnectStrategy::AnyCard => readers
                .into_iter()
                .find(PcscReader::has_card)
                .ok_or_else(|| PcscError::NoCard("any reader".to_string())),
        }
    }

    /// Connect to the card in the reader a strategy designates
    pub fn connect(
        &self,
        strategy: &ConnectStrategy,
        config: PcscConfig,
    ) -> Result<PcscTransport, PcscError> {
        let reader = self.find_reader(strategy)?;
        PcscTransport::open(self.context.clone(), reader.name(), config)
    }
}
