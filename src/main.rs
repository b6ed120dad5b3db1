//! xdbe - X11 server with the DOUBLE-BUFFER extension
//!
//! ```text
//! xdbe serve --display 5 --screens 2 --stub-screen 1
//! DISPLAY=:5 some-dbe-client
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::cell::RefCell;
use std::rc::Rc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::LocalSet;

use xdbe::client::Client;
use xdbe::dbe::{DbeScreen, SwapPolicy};
use xdbe::setup::{setup_request_length, SETUP_PREFIX_LEN};
use xdbe::wire::request_length;
use xdbe::{ServerConfig, X11Server};

const X11_UNIX_DIR: &str = "/tmp/.X11-unix";

#[derive(Parser)]
#[command(name = "xdbe")]
#[command(about = "X11 server with the DOUBLE-BUFFER extension")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Backend swaps one window per call
    One,
    /// Backend swaps every window of a screen per call
    Screen,
}

impl From<PolicyArg> for SwapPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::One => SwapPolicy::OnePerCall,
            PolicyArg::Screen => SwapPolicy::SameScreen,
        }
    }
}

#[derive(clap::Args)]
struct ScreenArgs {
    /// Number of screens
    #[arg(long, default_value = "1")]
    screens: usize,

    /// Screen width in pixels
    #[arg(long, default_value = "1280")]
    width: u16,

    /// Screen height in pixels
    #[arg(long, default_value = "720")]
    height: u16,

    /// Screen without double buffering (repeatable)
    #[arg(long = "stub-screen", value_name = "INDEX")]
    stub_screens: Vec<usize>,

    /// How many windows the backend swaps per call
    #[arg(long, value_enum, default_value = "screen")]
    swap_policy: PolicyArg,

    /// Bound on live resource table entries
    #[arg(long)]
    resource_limit: Option<usize>,
}

impl ScreenArgs {
    fn config(&self) -> Result<ServerConfig> {
        if self.screens == 0 || self.screens > u8::MAX as usize {
            bail!("screen count must be between 1 and {}", u8::MAX);
        }
        if let Some(&bad) = self.stub_screens.iter().find(|&&s| s >= self.screens) {
            bail!("stubbed screen {} does not exist", bad);
        }
        Ok(ServerConfig {
            screens: self.screens,
            width: self.width,
            height: self.height,
            stubbed_screens: self.stub_screens.clone(),
            swap_policy: self.swap_policy.into(),
            resource_limit: self.resource_limit,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Serve X11 clients on a local display socket
    Serve {
        /// Display number to serve (e.g., 5 or :5)
        #[arg(short, long, default_value = ":5")]
        display: String,

        #[command(flatten)]
        screens: ScreenArgs,
    },

    /// Print the double-buffer visuals of every screen
    Visuals {
        #[command(flatten)]
        screens: ScreenArgs,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("xdbe=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { display, screens } => {
            let display_num = parse_display(&display)?;
            let config = screens.config()?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to start runtime")?;
            let local = LocalSet::new();
            local.block_on(&runtime, run_server(display_num, config))
        }
        Commands::Visuals { screens } => print_visuals(&screens.config()?),
    }
}

fn parse_display(display: &str) -> Result<u32> {
    display
        .trim_start_matches(':')
        .parse()
        .context("invalid display number")
}

fn print_visuals(config: &ServerConfig) -> Result<()> {
    for (index, screen) in config.dbe_screens().iter().enumerate() {
        match screen {
            DbeScreen::Capable(backend) => {
                let visuals = backend
                    .visual_info(index)
                    .with_context(|| format!("screen {}: cannot list visuals", index))?;
                println!("screen {}: {} visuals", index, visuals.len());
                for info in visuals {
                    println!(
                        "  visual {:#x} depth {} perf {}",
                        info.visual, info.depth, info.perf_level
                    );
                }
            }
            DbeScreen::Stubbed => println!("screen {}: no double buffering", index),
        }
    }
    Ok(())
}

async fn run_server(display_num: u32, config: ServerConfig) -> Result<()> {
    let socket_path = format!("{}/X{}", X11_UNIX_DIR, display_num);
    let _ = std::fs::remove_file(&socket_path);
    std::fs::create_dir_all(X11_UNIX_DIR).ok();
    let listener = UnixListener::bind(&socket_path).context("failed to create X11 socket")?;

    let server = Rc::new(RefCell::new(X11Server::new(config)));
    log::info!("serving DISPLAY=:{}", display_num);

    loop {
        let (stream, _) = listener.accept().await.context("accept failed")?;
        let server = Rc::clone(&server);
        tokio::task::spawn_local(async move {
            if let Err(e) = handle_client(stream, server).await {
                log::warn!("client error: {:#}", e);
            }
        });
    }
}

/// Frame one connection: the setup exchange, then requests until EOF
async fn handle_client(mut stream: UnixStream, server: Rc<RefCell<X11Server>>) -> Result<()> {
    let mut prefix = [0u8; SETUP_PREFIX_LEN];
    stream.read_exact(&mut prefix).await.context("reading setup")?;
    let (byte_order, setup_len) =
        setup_request_length(&prefix).context("bad byte order in connection setup")?;
    let mut auth = vec![0u8; setup_len - SETUP_PREFIX_LEN];
    stream.read_exact(&mut auth).await.context("reading authorization")?;

    let mut client = server.borrow_mut().connect(byte_order);
    let reply = server.borrow().setup_reply(&client);
    stream.write_all(&reply).await?;

    let result = serve_requests(&mut stream, &server, &mut client).await;
    server.borrow_mut().disconnect(&client);
    result
}

/// Read requests and write replies until the client hangs up
async fn serve_requests(
    stream: &mut UnixStream,
    server: &Rc<RefCell<X11Server>>,
    client: &mut Client,
) -> Result<()> {
    let swapped = client.swapped();
    let mut header = [0u8; 4];
    loop {
        match stream.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e).context("reading request"),
        }
        let len = request_length(&header, swapped).unwrap_or(0);
        if len == 0 {
            bail!("big requests are not supported");
        }
        let mut data = vec![0u8; len];
        data[..4].copy_from_slice(&header);
        stream
            .read_exact(&mut data[4..])
            .await
            .context("reading request body")?;

        let reply = server.borrow_mut().process_request(client, &data);
        if !reply.is_empty() {
            stream.write_all(&reply).await?;
        }
    }
}
