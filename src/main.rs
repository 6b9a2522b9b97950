//! Purpose: `dllship` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs resolution, prints the result.
//! Invariants: Commands print one prefix-relative path or DLL name per line
//! unless `--json` is given, in which case one JSON object goes to stdout.
//! Invariants: Errors are emitted as a single line on stderr (plus a hint
//! line when one exists) and the exit code is derived from `to_exit_code`.
//! Invariants: All resolution goes through `core`; no closure logic here.
use std::io;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::aot::Shell;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use dllship::core::cache::ResolutionCache;
use dllship::core::closure::{self, DependencySet};
use dllship::core::error::{Error, ErrorKind, to_exit_code};
use dllship::core::prefix::Prefix;
use dllship::core::validate::validate_roots;

#[derive(Parser)]
#[command(
    name = "dllship",
    version,
    about = "Compute DLL dependency closures for GStreamer plugin deployment prefixes",
    after_help = r#"EXAMPLES
  $ dllship plugin-deps --prefix C:\gst-install coreelements app
  $ dllship plugin-deps --prefix C:\gst-install --system --json webrtc
  $ dllship dll-deps --recursive C:\gst-install\bin\libgstreamer-1.0-0.dll
  $ dllship target --prefix C:\gst-install coreelements app

LOGGING
  Set RUST_LOG (e.g. RUST_LOG=debug) to trace resolution decisions."#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "List every file the named plugins need, relative to the prefix",
        arg_required_else_help = true
    )]
    PluginDeps {
        #[arg(help = "Logical plugin names (e.g. coreelements, app)", required = true)]
        plugins: Vec<String>,
        #[arg(
            short = 'p',
            long,
            help = "Installation prefix to look for plugins in",
            value_hint = ValueHint::DirPath
        )]
        prefix: PathBuf,
        #[arg(long, help = "Also list system DLLs (bare names, unresolved)")]
        system: bool,
        #[arg(long, help = "Emit a single JSON object instead of lines")]
        json: bool,
    },
    #[command(
        about = "List the imports of arbitrary DLL files",
        arg_required_else_help = true
    )]
    DllDeps {
        #[arg(help = "DLL paths to inspect", required = true, value_hint = ValueHint::FilePath)]
        dllpaths: Vec<PathBuf>,
        #[arg(
            long,
            help = "Follow imports recursively through the inferred prefix"
        )]
        recursive: bool,
        #[arg(long, help = "Also list system DLLs")]
        system: bool,
        #[arg(long, help = "Emit a single JSON object instead of lines")]
        json: bool,
    },
    #[command(
        about = "Print the common architecture and buildtype of the named plugins",
        arg_required_else_help = true
    )]
    Target {
        #[arg(help = "Logical plugin names", required = true)]
        plugins: Vec<String>,
        #[arg(
            short = 'p',
            long,
            help = "Installation prefix to look for plugins in",
            value_hint = ValueHint::DirPath
        )]
        prefix: PathBuf,
        #[arg(long, help = "Emit a single JSON object instead of one line")]
        json: bool,
    },
    #[command(about = "Generate shell completions")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(err) = run(cli.command) {
        eprintln!("dllship: {err}");
        if let Some(hint) = err.hint() {
            eprintln!("hint: {hint}");
        }
        std::process::exit(to_exit_code(err.kind()));
    }
}

fn run(command: Command) -> Result<(), Error> {
    match command {
        Command::PluginDeps {
            plugins,
            prefix,
            system,
            json,
        } => {
            let prefix = Prefix::new(prefix);
            let names = sorted_names(plugins);
            let mut cache = ResolutionCache::new();
            let deps = closure::plugin_closure(&mut cache, &prefix, &names, system)?;
            if json {
                emit_json(json!({
                    "prefix": prefix.root().display().to_string(),
                    "plugins": names,
                    "deps": dep_strings(&deps),
                }))?;
            } else {
                for path in deps.iter() {
                    println!("{}", path.display());
                }
            }
            Ok(())
        }
        Command::DllDeps {
            dllpaths,
            recursive,
            system,
            json,
        } => {
            let mut cache = ResolutionCache::new();
            let deps = if recursive {
                recursive_dll_deps(&mut cache, &dllpaths, system)?
            } else {
                direct_dll_deps(&mut cache, &dllpaths, system)?
            };
            if json {
                emit_json(json!({ "deps": dep_strings(&deps) }))?;
            } else {
                for path in deps.iter() {
                    println!("{}", path.display());
                }
            }
            Ok(())
        }
        Command::Target {
            plugins,
            prefix,
            json,
        } => {
            let prefix = Prefix::new(prefix);
            let names = sorted_names(plugins);
            let roots = closure::plugin_roots(&prefix, &names)?;
            let mut cache = ResolutionCache::new();
            let (machine, buildtype) = validate_roots(&mut cache, &roots)?;
            if json {
                emit_json(json!({
                    "arch": machine.label(),
                    "buildtype": buildtype.label(),
                }))?;
            } else {
                println!("{machine} {buildtype}");
            }
            Ok(())
        }
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "dllship", &mut io::stdout());
            Ok(())
        }
    }
}

fn recursive_dll_deps(
    cache: &mut ResolutionCache,
    dllpaths: &[PathBuf],
    system: bool,
) -> Result<DependencySet, Error> {
    let mut out = DependencySet::new();
    for path in dllpaths {
        let Some(prefix) = Prefix::infer(path) else {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("could not infer a prefix")
                .with_path(path)
                .with_hint(
                    "Recursive mode needs DLLs under <prefix>/bin or <prefix>/lib/gstreamer-1.0.",
                ));
        };
        let deps = closure::closure(
            cache,
            &prefix,
            std::slice::from_ref(path),
            &prefix.search_dirs(),
            system,
        )?;
        for dep in deps.iter() {
            out.insert(dep.to_path_buf());
        }
    }
    Ok(out)
}

fn direct_dll_deps(
    cache: &mut ResolutionCache,
    dllpaths: &[PathBuf],
    system: bool,
) -> Result<DependencySet, Error> {
    let mut out = DependencySet::new();
    for path in dllpaths {
        for name in closure::direct_imports(cache, path, system)? {
            out.insert(PathBuf::from(name));
        }
    }
    Ok(out)
}

fn sorted_names(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names.dedup();
    names
}

fn dep_strings(deps: &DependencySet) -> Vec<String> {
    deps.iter().map(|path| path.display().to_string()).collect()
}

fn emit_json(value: serde_json::Value) -> Result<(), Error> {
    let text = serde_json::to_string_pretty(&value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to serialize output")
            .with_source(err)
    })?;
    println!("{text}");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}
