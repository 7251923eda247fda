//! Command line interface for gencontainer

use crate::VERSION;
use crate::config::Config;
use crate::ctx::Context;
use crate::layout::{DEFAULT_KEY_FILE, Layout};
use crate::lifecycle::{self, ReplaceRequest, SignRequest};
use crate::signing::OpenSslSigner;
use crate::types::{AuthType, CompressAlg, HashAlg, ImageType};
use anyhow::{Context as _, Result};
use clap::{ArgGroup, Parser, Subcommand};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Command line arguments for gencontainer
#[derive(Parser, Debug)]
#[command(name = "gencontainer")]
#[command(version = VERSION)]
#[command(about = "Build, inspect and modify firmware container images", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode - only output errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (default: ./gencontainer.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Display a container image
    View(ViewArgs),
    /// Create a container image
    Create(CreateArgs),
    /// Extract component images
    Extract(ExtractArgs),
    /// Replace a component image
    Replace(ReplaceArgs),
    /// Compress and sign a component image
    Sign(SignArgs),
}

#[derive(Parser, Debug)]
pub struct ViewArgs {
    /// Container input image
    #[arg(short = 'i', long)]
    pub image: PathBuf,

    /// Print in JSON format
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("input").required(true).args(["layout", "comp_list"])))]
pub struct CreateArgs {
    /// Container layout input file
    #[arg(short = 'l', long)]
    pub layout: Option<PathBuf>,

    /// Component files in NAME:FILE format
    #[arg(long = "cl", num_args = 1..)]
    pub comp_list: Vec<String>,

    /// Container image type for --cl: NORMAL, CLASSIC or MULTIBOOT
    #[arg(short = 't', long = "type", default_value = "CLASSIC")]
    pub image_type: ImageType,

    /// Container output directory or file
    #[arg(short = 'o', long = "out")]
    pub out_path: Option<PathBuf>,

    /// Signing key directory or file
    #[arg(short = 'k', long = "key")]
    pub key_path: Option<PathBuf>,

    /// Hash algorithm for signing: SHA2_256 or SHA2_384
    #[arg(long = "ht")]
    pub hash_alg: Option<HashAlg>,

    /// Component image input directory
    #[arg(long = "cd")]
    pub comp_dir: Option<PathBuf>,

    /// Compression tool directory
    #[arg(long = "td")]
    pub tool_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ExtractArgs {
    /// Container input image
    #[arg(short = 'i', long)]
    pub image: PathBuf,

    /// Component name to extract (default: all, plus a layout file)
    #[arg(short = 'n', long)]
    pub name: Option<String>,

    /// Output directory
    #[arg(long = "od")]
    pub out_dir: Option<PathBuf>,

    /// Compression tool directory
    #[arg(long = "td")]
    pub tool_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ReplaceArgs {
    /// Container input image
    #[arg(short = 'i', long)]
    pub image: PathBuf,

    /// Container output image name
    #[arg(short = 'o', long = "out")]
    pub new_name: Option<String>,

    /// Component name to replace
    #[arg(short = 'n', long)]
    pub name: String,

    /// Component input file, raw or pre-signed
    #[arg(short = 'f', long)]
    pub file: PathBuf,

    /// Compression algorithm: lz4, lzma or dummy (default: keep the original)
    #[arg(short = 'c', long)]
    pub compress: Option<CompressAlg>,

    /// Private key to sign the component
    #[arg(short = 'k', long = "key")]
    pub key_file: Option<PathBuf>,

    /// Hash algorithm for signing: SHA2_256 or SHA2_384
    #[arg(long = "ht")]
    pub hash_alg: Option<HashAlg>,

    /// Output directory
    #[arg(long = "od")]
    pub out_dir: Option<PathBuf>,

    /// Compression tool directory
    #[arg(long = "td")]
    pub tool_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct SignArgs {
    /// Component input file
    #[arg(short = 'f', long)]
    pub file: PathBuf,

    /// Signed output image name
    #[arg(short = 'o', long = "out")]
    pub sign_file: Option<String>,

    /// Compression algorithm: lz4, lzma or dummy
    #[arg(short = 'c', long, default_value = "dummy")]
    pub compress: CompressAlg,

    /// Authentication: NONE, SHA2_256, SHA2_384, RSA2048 or RSA3072
    #[arg(short = 'a', long, default_value = "NONE")]
    pub auth: AuthType,

    /// Private key to sign the component
    #[arg(short = 'k', long = "key")]
    pub key_file: Option<PathBuf>,

    /// Hash algorithm for RSA signing: SHA2_256 or SHA2_384
    #[arg(long = "ht")]
    pub hash_alg: Option<HashAlg>,

    /// Output directory
    #[arg(long = "od")]
    pub out_dir: Option<PathBuf>,

    /// Compression tool directory
    #[arg(long = "td")]
    pub tool_dir: Option<PathBuf>,
}

/// Initialise `env_logger`; `RUST_LOG` overrides the level picked by the flags
pub fn init_logging(args: &Args) {
    let level = if args.quiet {
        "error"
    } else if args.verbose {
        "debug"
    } else {
        "warn"
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}

pub fn run_cli(args: Args) -> Result<()> {
    let quiet = args.quiet;
    let config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::View(view_args) => handle_view(view_args),
        Commands::Create(create_args) => handle_create(create_args, &config, quiet),
        Commands::Extract(extract_args) => handle_extract(extract_args, &config, quiet),
        Commands::Replace(replace_args) => handle_replace(replace_args, &config, quiet),
        Commands::Sign(sign_args) => handle_sign(sign_args, &config, quiet),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::discover(Path::new("."))?.unwrap_or_default(),
    };
    Ok(config)
}

/// Directory overrides given on the command line
#[derive(Default)]
struct Dirs {
    out_dir: Option<PathBuf>,
    input_dir: Option<PathBuf>,
    key_dir: Option<PathBuf>,
    tool_dir: Option<PathBuf>,
    hash_alg: Option<HashAlg>,
}

/// Resolve flag > config file > `fallback` for every setting
fn build_context(dirs: Dirs, config: &Config, fallback: &Path, quiet: bool) -> Result<Context> {
    let openssl = config
        .openssl
        .clone()
        .unwrap_or_else(|| PathBuf::from("openssl"));
    let mut ctx = Context::new(Box::new(OpenSslSigner::new(openssl, !quiet)));
    let pick = |flag: Option<PathBuf>, file: &Option<PathBuf>| {
        flag.or_else(|| file.clone())
            .unwrap_or_else(|| fallback.to_path_buf())
    };

    ctx.out_dir = pick(dirs.out_dir, &config.out_dir);
    ctx.input_dir = pick(dirs.input_dir, &config.comp_dir);
    ctx.key_dir = pick(dirs.key_dir, &config.key_dir);
    ctx.tool_dir = pick(dirs.tool_dir, &config.tool_dir);
    ctx.hash_alg = match dirs.hash_alg {
        Some(alg) => alg,
        None => config.hash_alg()?.unwrap_or_default(),
    };
    ctx.echo = !quiet;
    debug!(
        "out_dir={} input_dir={} key_dir={} tool_dir={} hash={}",
        ctx.out_dir.display(),
        ctx.input_dir.display(),
        ctx.key_dir.display(),
        ctx.tool_dir.display(),
        ctx.hash_alg
    );
    Ok(ctx)
}

/// Split a path that names either a directory or a file inside one
fn split_dir_file(path: &Path, default_file: &str) -> (PathBuf, String) {
    if path.as_os_str().is_empty() || path.is_dir() {
        return (path.to_path_buf(), default_file.to_string());
    }
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    (dir, file)
}

fn handle_view(args: ViewArgs) -> Result<()> {
    let report = if args.json {
        lifecycle::view_json(&args.image)?
    } else {
        lifecycle::view(&args.image)?
    };
    println!("{}", report.trim_end());
    Ok(())
}

fn handle_create(args: CreateArgs, config: &Config, quiet: bool) -> Result<()> {
    let (layout, ctx) = match &args.layout {
        Some(layout_file) => {
            let text = fs::read_to_string(layout_file).with_context(|| {
                format!("failed to read layout file '{}'", layout_file.display())
            })?;
            let layout = Layout::parse(&text)?;
            let layout_dir = layout_file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            let dirs = Dirs {
                out_dir: args.out_path,
                input_dir: args.comp_dir,
                key_dir: args.key_path,
                tool_dir: args.tool_dir,
                hash_alg: args.hash_alg,
            };
            let ctx = build_context(dirs, config, &layout_dir, quiet)?;
            (layout, ctx)
        }
        None => {
            let (key_dir, key_file) = match &args.key_path {
                Some(path) => {
                    let (dir, file) = split_dir_file(path, DEFAULT_KEY_FILE);
                    (Some(dir), file)
                }
                None => (None, String::new()),
            };
            let (out_dir, out_file) = match &args.out_path {
                Some(path) => {
                    let (dir, file) = split_dir_file(path, "");
                    (Some(dir), file)
                }
                None => (None, String::new()),
            };

            let dirs = Dirs {
                out_dir,
                input_dir: args.comp_dir,
                key_dir,
                tool_dir: args.tool_dir,
                hash_alg: args.hash_alg,
            };
            let ctx = build_context(dirs, config, Path::new("."), quiet)?;

            let (key_auth, key_file) = match ctx.key_path(&key_file) {
                Some(key) if key.is_file() => (ctx.signer().key_auth_type(&key)?, key_file),
                _ => (AuthType::None, String::new()),
            };
            let layout = Layout::from_component_list(
                &args.comp_list,
                args.image_type,
                key_auth,
                &key_file,
                &out_file,
                ctx.hash_alg,
            )?;
            debug!("generated layout:\n{layout}");
            (layout, ctx)
        }
    };

    let out_file = lifecycle::create(&ctx, &layout)?;
    if !quiet {
        println!(
            "Container '{}' was created successfully at:\n  {}",
            crate::types::tag_to_string(&layout.container.signature),
            out_file.display()
        );
    }
    Ok(())
}

fn handle_extract(args: ExtractArgs, config: &Config, quiet: bool) -> Result<()> {
    let dirs = Dirs {
        out_dir: args.out_dir,
        tool_dir: args.tool_dir,
        ..Default::default()
    };
    let ctx = build_context(dirs, config, Path::new("."), quiet)?;
    let files = lifecycle::extract(&ctx, &args.image, args.name.as_deref())?;
    if !quiet {
        println!(
            "Components were extracted successfully at:\n  {}",
            ctx.out_dir.display()
        );
        for file in files {
            debug!("wrote {}", file.display());
        }
    }
    Ok(())
}

fn handle_replace(args: ReplaceArgs, config: &Config, quiet: bool) -> Result<()> {
    let dirs = Dirs {
        out_dir: args.out_dir,
        tool_dir: args.tool_dir,
        hash_alg: args.hash_alg,
        ..Default::default()
    };
    let ctx = build_context(dirs, config, Path::new("."), quiet)?;
    let request = ReplaceRequest {
        image: args.image,
        name: args.name,
        file: args.file,
        compress: args.compress,
        key_file: args.key_file,
        output: args.new_name,
    };
    let out_file = lifecycle::replace(&ctx, &request)?;
    if !quiet {
        println!(
            "Component '{}' was replaced successfully at:\n  {}",
            request.name,
            out_file.display()
        );
    }
    Ok(())
}

fn handle_sign(args: SignArgs, config: &Config, quiet: bool) -> Result<()> {
    let dirs = Dirs {
        out_dir: args.out_dir,
        tool_dir: args.tool_dir,
        hash_alg: args.hash_alg,
        ..Default::default()
    };
    let ctx = build_context(dirs, config, Path::new("."), quiet)?;
    let request = SignRequest {
        file: args.file,
        compress: args.compress,
        auth_type: args.auth,
        key_file: args.key_file,
        output: args.sign_file,
    };
    let out_file = lifecycle::sign(&ctx, &request)?;
    if !quiet {
        println!(
            "Component file was signed successfully at:\n  {}",
            out_file.display()
        );
    }
    Ok(())
}
