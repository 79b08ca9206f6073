use std::time::Duration;

use anyhow::{bail, Context, Result};
use leasehold_core::{
    AcquireRequest, Clock, FileStore, Lease, LockClient, LockError, LockStore, Release,
};
use tokio::{process::Command, select};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    cli::Commands,
    exit::{
        child_code, lock_error_code, release_code, EXIT_ERROR, EXIT_INTERRUPTED, EXIT_OK,
    },
    initialize_stderr_logging, Cli,
};

/// A held lease is renewed this many times per lease duration.
const RENEW_INTERVAL_DIVISOR: u32 = 3;

pub struct App {
    cli: Cli,
}

impl App {
    pub fn new(cli: Cli) -> App {
        App { cli }
    }

    /// Run the command line and return the process exit code.
    #[tracing::instrument(skip_all)]
    pub async fn run(&mut self) -> Result<u8> {
        if self.cli.version() {
            println!("leasehold {}", env!("CARGO_PKG_VERSION"));
            return Ok(EXIT_OK);
        }

        initialize_stderr_logging();

        let store = FileStore::open(self.cli.store_dir()?)?;
        let client = LockClient::with_config(store, self.cli.client_config());

        // Set up ctrl-c handler
        let interrupted = CancellationToken::new();
        let ctrl_c_interrupted = interrupted.clone();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received ctrl-c, shutting down...");
                ctrl_c_interrupted.cancel();
            }
        });

        let res = self.execute(&client, &interrupted).await;
        ctrl_c.abort();
        if let Err(e) = &res {
            error!(err = %e);
        }
        res
    }

    /// Carry out the parsed command against `client`. Lock outcomes become
    /// exit codes; anything else is returned as an error.
    pub async fn execute<S: LockStore + 'static>(
        &self,
        client: &LockClient<S>,
        interrupted: &CancellationToken,
    ) -> Result<u8> {
        let res = match &self.cli.commands {
            Commands::Acquire {
                lock_id,
                lease,
                wait,
                poll,
            } => {
                let mut request = AcquireRequest::new(lock_id, (*lease).into());
                if let Some(wait) = wait {
                    request = request.with_wait_timeout((*wait).into());
                }
                if let Some(poll) = poll {
                    request = request.with_poll_interval((*poll).into());
                }
                client
                    .acquire_with_cancel(interrupted, &request)
                    .await
                    .map(|lease| {
                        println!("{}", lease.lease_id());
                        EXIT_OK
                    })
            }
            Commands::Renew {
                lock_id,
                lease_id,
                lease,
            } => client
                .renew(lock_id, lease_id, (*lease).into())
                .await
                .map(|lease| {
                    println!("{}", lease.lease_id());
                    EXIT_OK
                }),
            Commands::Release { lock_id, lease_id } => {
                client.release(lock_id, lease_id).await.map(|release| {
                    match release {
                        Release::Released => println!("released"),
                        Release::NotHeld => println!("not held"),
                    }
                    release_code(release)
                })
            }
            Commands::Show { lock_id } => match client.inspect(lock_id).await {
                Ok(Some(status)) => {
                    println!("{}", serde_json::to_string_pretty(&status.record)?);
                    if status.live {
                        println!("live, expires in {}s", status.remaining().as_secs());
                    } else {
                        println!("expired");
                    }
                    Ok(EXIT_OK)
                }
                Ok(None) => {
                    println!("free");
                    Ok(EXIT_OK)
                }
                Err(e) => Err(e),
            },
            Commands::Exec {
                lock_id,
                lease,
                wait,
                command,
            } => {
                let mut request = AcquireRequest::new(lock_id, (*lease).into());
                if let Some(wait) = wait {
                    request = request.with_wait_timeout((*wait).into());
                }
                return self.exec(client, interrupted, &request, command).await;
            }
            Commands::Version => bail!("unexpected subcommand"),
        };

        match res {
            Ok(code) => Ok(code),
            Err(e) => lock_outcome(e),
        }
    }

    #[tracing::instrument(skip_all, fields(lock_id = %request.lock_id()))]
    async fn exec<S: LockStore + 'static>(
        &self,
        client: &LockClient<S>,
        interrupted: &CancellationToken,
        request: &AcquireRequest,
        command: &[String],
    ) -> Result<u8> {
        let Some((program, args)) = command.split_first() else {
            bail!("no command to run");
        };

        let lease = match client.acquire_with_cancel(interrupted, request).await {
            Ok(lease) => lease,
            Err(e) => return lock_outcome(e),
        };

        let mut child = match Command::new(program)
            .args(args)
            .env("LEASEHOLD_LOCK_ID", lease.lock_id())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("running {program:?}"))
        {
            Ok(child) => child,
            Err(e) => {
                release_quietly(client, &lease).await;
                return Err(e);
            }
        };
        debug!(pid = ?child.id(), "started child");

        let stop = CancellationToken::new();
        let mut renewer = tokio::spawn(keep_renewed(client.clone(), lease, stop.clone()));

        select! {
            status = child.wait() => {
                stop.cancel();
                let status = status.context("waiting for child")?;
                match renewer.await? {
                    Ok(lease) => {
                        release_quietly(client, &lease).await;
                        Ok(child_code(status))
                    }
                    Err(e) => lock_outcome(e),
                }
            }
            res = &mut renewer => {
                warn!("lease lost, stopping child");
                child.kill().await.context("stopping child")?;
                match res? {
                    Ok(_) => bail!("renewal stopped unexpectedly"),
                    Err(e) => lock_outcome(e),
                }
            }
            _ = interrupted.cancelled() => {
                stop.cancel();
                child.kill().await.context("stopping child")?;
                if let Ok(lease) = renewer.await? {
                    release_quietly(client, &lease).await;
                }
                Ok(EXIT_INTERRUPTED)
            }
        }
    }
}

/// Keep `lease` alive until `stop` fires, returning the lease current at that
/// point. Fails once the lease is lost.
async fn keep_renewed<S: LockStore>(
    client: LockClient<S>,
    mut lease: Lease,
    stop: CancellationToken,
) -> Result<Lease, LockError> {
    let interval = renew_interval(lease.lease_duration());
    loop {
        select! {
            _ = stop.cancelled() => return Ok(lease),
            _ = tokio::time::sleep(interval) => {}
        }
        match client
            .renew(lease.lock_id(), lease.lease_id(), lease.lease_duration())
            .await
        {
            Ok(renewed) => lease = renewed,
            Err(LockError::Backend(e)) if client.clock().now() < lease.expires_at() => {
                warn!(err = %e, expires_at = %lease.expires_at(), "renewal failed, will retry");
            }
            Err(LockError::Backend(e)) => {
                error!(err = %e, "lease expired while renewal kept failing");
                return Err(LockError::LeaseLost {
                    lock_id: lease.lock_id().to_owned(),
                });
            }
            Err(e) => return Err(e),
        }
    }
}

fn renew_interval(lease_duration: Duration) -> Duration {
    lease_duration / RENEW_INTERVAL_DIVISOR
}

async fn release_quietly<S: LockStore>(client: &LockClient<S>, lease: &Lease) {
    match client.release(lease.lock_id(), lease.lease_id()).await {
        Ok(Release::Released) => {}
        Ok(Release::NotHeld) => warn!("lease was already gone at release"),
        Err(e) => warn!(err = %e, "release failed, lease will expire"),
    }
}

/// Report a lock outcome on stderr and turn it into an exit code. Backend
/// failures stay errors.
fn lock_outcome(err: LockError) -> Result<u8> {
    let code = lock_error_code(&err);
    if code == EXIT_ERROR {
        return Err(err.into());
    }
    eprintln!("leasehold: {err}");
    Ok(code)
}
