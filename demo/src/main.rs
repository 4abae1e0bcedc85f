//! localsock demo - echo server and client over a Unix domain socket.
//!
//! ```text
//! RUST_LOG=debug localsock-demo serve --path /tmp/echo.sock
//! localsock-demo connect --path /tmp/echo.sock --message hello
//! ```

#[cfg(unix)]
mod echo {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use anyhow::{Context, bail};
    use clap::{Parser, Subcommand, ValueEnum};
    use localsock::{
        ErrorCode, SocketMode, TransportEndpointBuilder, UnixConfig, UnixEndpoint,
        UnixSocketProvider,
    };
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tracing::{info, warn};

    #[derive(Parser, Debug)]
    #[command(
        name = "localsock-demo",
        version,
        about = "Echo server and client over localsock endpoints"
    )]
    pub struct Cli {
        #[command(subcommand)]
        pub command: Command,
    }

    #[derive(Subcommand, Debug)]
    pub enum Command {
        /// Accept connections and echo everything back
        Serve {
            /// Socket path
            #[arg(long, env = "LOCALSOCK_PATH")]
            path: PathBuf,

            /// Requested listen backlog
            #[arg(long, default_value_t = 511)]
            backlog: usize,

            /// Grant other users access to the socket
            #[arg(long, value_enum)]
            mode: Option<Access>,
        },

        /// Send one message and print the echo
        Connect {
            /// Socket path
            #[arg(long, env = "LOCALSOCK_PATH")]
            path: PathBuf,

            /// Message to send
            #[arg(long, default_value = "ping")]
            message: String,
        },
    }

    #[derive(ValueEnum, Clone, Copy, Debug)]
    pub enum Access {
        Read,
        Write,
        ReadWrite,
    }

    impl Access {
        fn bits(self) -> u32 {
            match self {
                Self::Read => SocketMode::READABLE,
                Self::Write => SocketMode::WRITABLE,
                Self::ReadWrite => SocketMode::READABLE | SocketMode::WRITABLE,
            }
        }
    }

    pub async fn run(cli: Cli) -> anyhow::Result<()> {
        match cli.command {
            Command::Serve {
                path,
                backlog,
                mode,
            } => serve(path, backlog, mode).await,
            Command::Connect { path, message } => connect(path, message).await,
        }
    }

    fn path_str(path: &Path) -> anyhow::Result<String> {
        path.to_str()
            .map(str::to_string)
            .with_context(|| format!("socket path {path:?} is not valid UTF-8"))
    }

    async fn serve(path: PathBuf, backlog: usize, mode: Option<Access>) -> anyhow::Result<()> {
        let provider = UnixSocketProvider::with_config(UnixConfig {
            remove_stale_socket: true,
            ..UnixConfig::default()
        });
        let endpoint: Arc<UnixEndpoint> =
            Arc::new(TransportEndpointBuilder::new_server(provider).build());

        endpoint.bind(path_str(&path)?);
        let code = endpoint.listen(backlog)?;
        if code != ErrorCode::Ok {
            bail!("listen on {} failed: {code}", path.display());
        }
        if let Some(mode) = mode {
            let code = endpoint.fchmod(mode.bits());
            if code != ErrorCode::Ok {
                bail!("fchmod on {} failed: {code}", path.display());
            }
        }
        let mut incoming = endpoint.incoming().context("listener already taken")?;
        info!("Echo server ready on {}", path.display());

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down");
                    break;
                }
                event = incoming.recv() => {
                    let Some(event) = event else { break };
                    let (code, handle) = event.into_parts();
                    let Some(handle) = handle else {
                        warn!("Accept failed: {code}");
                        continue;
                    };
                    let endpoint = Arc::clone(&endpoint);
                    tokio::spawn(async move {
                        if let Err(e) = echo(handle.into_inner().into_inner()).await {
                            warn!("Echo connection failed: {e}");
                        }
                        endpoint.release_connection();
                    });
                }
            }
        }

        endpoint.close();
        let metrics = endpoint.metrics();
        info!(
            accepted = metrics.accepted,
            failures = metrics.accept_failures,
            throttled = metrics.throttled,
            "Echo server stopped"
        );
        Ok(())
    }

    async fn echo(mut stream: tokio::net::UnixStream) -> std::io::Result<()> {
        let mut buf = vec![0u8; 4096];
        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            stream.write_all(&buf[..n]).await?;
        }
    }

    async fn connect(path: PathBuf, message: String) -> anyhow::Result<()> {
        let endpoint: UnixEndpoint =
            TransportEndpointBuilder::new_client(UnixSocketProvider::new()).build();

        let mut result = ErrorCode::Unknown;
        endpoint
            .connect(path_str(&path)?, &mut result, |slot, code| *slot = code)
            .await;
        if result != ErrorCode::Ok {
            bail!("connect to {} failed: {result}", path.display());
        }

        let handle = endpoint.take_connection().context("connection missing")?;
        let mut stream = handle.into_inner().into_inner();
        stream.write_all(message.as_bytes()).await?;
        stream.shutdown().await?;

        let mut reply = String::new();
        stream.read_to_string(&mut reply).await?;
        println!("{reply}");
        Ok(())
    }
}

#[cfg(unix)]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use clap::Parser;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    echo::run(echo::Cli::parse()).await
}

#[cfg(not(unix))]
fn main() {
    eprintln!("localsock-demo requires Unix domain sockets");
    std::process::exit(1);
}
