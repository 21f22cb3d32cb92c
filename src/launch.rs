//! Start a group on the configured backend and run the same program on every rank.

use log::debug;

use crate::comm::Communicator;
use crate::config::{Backend, Config};
use crate::error::Result;
use crate::transport::local;
use crate::transport::shm::ShmTransport;
use crate::transport::Transport;

/// The per-rank body of a program, generic over the transport it runs on.
pub trait RankMain: Sync {
    fn run<T: Transport>(&self, comm: &Communicator<T>) -> Result<()>;
}

/// Run `program` on `config.ranks` ranks using `config.backend`.
///
/// With [`Backend::SharedMemory`] the current executable is re-run once per
/// extra rank, so everything before the call to `launch` runs in every
/// process. If rank 0's program fails, its error is returned and the spawned
/// ranks are killed when its endpoint is dropped.
pub fn launch<P: RankMain>(config: Config, program: &P) -> Result<()> {
    debug!("Launching {} ranks on {:?}", config.ranks, config.backend);
    match config.backend {
        Backend::Threads => local::run(config.ranks, |transport| {
            program.run(&Communicator::new(transport, config))
        })?
        .into_iter()
        .collect(),
        Backend::SharedMemory => {
            let comm = Communicator::new(ShmTransport::init(config.ranks)?, config);
            program.run(&comm)?;
            comm.into_transport().finalize()
        }
    }
}
