use std::{env, io};

use collective::{Communicator, Solo, TcpCoordinator, TcpMember, TopologySpec};
use log::{info, warn};
use sensitivity::{FluxModel, Plan, RunConfig, Session};
use tokio::signal;

const DEFAULT_CONFIG: &str = "run.json";

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let config_path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = RunConfig::load(&config_path)?;
    let timeout = config.timeout();

    let work = async {
        match TopologySpec::from_env()? {
            None => {
                warn!("no multi-process environment found, running as a single process");
                run(&mut Solo, &config).await
            }
            Some(spec) if spec.is_coordinator() => {
                let mut comm =
                    TcpCoordinator::listen(spec.addr.as_str(), spec.size, timeout).await?;
                run(&mut comm, &config).await
            }
            Some(spec) => {
                let mut comm = TcpMember::connect(&spec.addr, spec.rank, spec.size, timeout).await?;
                run(&mut comm, &config).await
            }
        }
    };

    tokio::select! {
        ret = work => {
            ret?;
            info!("wrapping up, disconnecting...");
        }
        _ = signal::ctrl_c() => {
            info!("received SIGTERM");
        }
    }

    Ok(())
}

/// Loads this rank's model, takes part in the run and, on the coordinator, writes out
/// the outcome.
async fn run<C: Communicator>(comm: &mut C, config: &RunConfig) -> io::Result<()> {
    let rank = comm.rank();

    let setup = FluxModel::load(&config.model_path).and_then(|model| {
        let plan = comm
            .is_coordinator()
            .then(|| Plan::from_model(&model, config))
            .transpose()?;
        Ok((model, plan))
    });

    let (model, plan) = match setup {
        Ok(setup) => setup,
        Err(e) => {
            if let Err(abort_err) = comm.abort(&e.to_string()).await {
                warn!(rank = rank; "failed to abort the run: {abort_err}");
            }
            return Err(e.into());
        }
    };

    let mut session = Session::new(model, config.side);
    let Some(outcome) = session.run(comm, plan).await? else {
        info!(rank = rank; "run finished");
        return Ok(());
    };

    outcome.persist(&config.artifacts()).await?;
    info!(
        rows = outcome.results.len(),
        vars = outcome.problem.variable_count();
        "run finished"
    );

    Ok(())
}
