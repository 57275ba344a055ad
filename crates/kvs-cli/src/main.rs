use std::ffi::OsString;
use std::io::{self, Write};
use std::sync::Arc;

use kvs_engine::{FileBackend, KvsBackend};
use kvs_harness::scenario_tree;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    name: Option<String>,
    input: Option<String>,
    list: bool,
    show_help: bool,
}

fn main() {
    init_tracing();

    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    let exit_code = run(std::env::args_os(), &mut stdout, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Trace records go to stdout as flattened JSON lines; `RUST_LOG` overrides
/// the default `info` filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .json()
                .flatten_event(true)
                .with_writer(io::stdout),
        )
        .try_init();
}

fn run<I, W, E>(args: I, out: &mut W, err: &mut E) -> i32
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let options = match parse_args(args) {
        Ok(options) => options,
        Err(message) => {
            let _ = writeln!(err, "error: {message}");
            let _ = write_usage(err);
            return 2;
        }
    };

    if options.show_help {
        if write_usage(out).is_err() {
            return 1;
        }
        return 0;
    }

    let backend: Arc<dyn KvsBackend> = Arc::new(FileBackend);
    let tree = match scenario_tree(&backend) {
        Ok(tree) => tree,
        Err(error) => {
            let _ = writeln!(err, "error: {}: {error}", error.kind());
            return error.exit_code();
        }
    };

    if options.list {
        for path in tree.leaf_paths() {
            if writeln!(out, "{path}").is_err() {
                return 1;
            }
        }
        return 0;
    }

    let (Some(name), Some(input)) = (options.name, options.input) else {
        let _ = writeln!(err, "error: a scenario path and a JSON payload are required");
        let _ = write_usage(err);
        return 2;
    };

    match tree.run(&name, &input) {
        Ok(()) => 0,
        Err(error) => {
            let _ = writeln!(err, "error: {}: {error}", error.kind());
            if let Some(hint) = error.suggestion() {
                let _ = writeln!(err, "hint: {hint}");
            }
            error.exit_code()
        }
    }
}

fn parse_args<I>(args: I) -> Result<CliOptions, String>
where
    I: IntoIterator<Item = OsString>,
{
    let mut iter = args.into_iter();
    let _argv0 = iter.next();

    let mut name: Option<String> = None;
    let mut input: Option<String> = None;
    let mut list = false;
    let mut show_help = false;

    while let Some(argument) = iter.next() {
        let arg = argument.to_string_lossy();
        let arg_str = arg.as_ref();

        match arg_str {
            "-h" | "--help" => {
                show_help = true;
            }
            "--list" => {
                list = true;
            }
            "--name" => {
                let next = iter
                    .next()
                    .ok_or_else(|| String::from("missing scenario path for `--name`"))?;
                set_once(&mut name, next.to_string_lossy().into_owned(), "--name")?;
            }
            "--input" => {
                let next = iter
                    .next()
                    .ok_or_else(|| String::from("missing JSON payload for `--input`"))?;
                set_once(&mut input, next.to_string_lossy().into_owned(), "--input")?;
            }
            _ => {
                if let Some(value) = arg_str.strip_prefix("--name=") {
                    set_once(&mut name, value.to_owned(), "--name")?;
                    continue;
                }

                if let Some(value) = arg_str.strip_prefix("--input=") {
                    set_once(&mut input, value.to_owned(), "--input")?;
                    continue;
                }

                if arg_str.starts_with('-') {
                    return Err(format!("unknown option `{arg_str}`"));
                }

                if name.is_none() {
                    name = Some(arg_str.to_owned());
                } else if input.is_none() {
                    input = Some(arg_str.to_owned());
                } else {
                    return Err(String::from(
                        "too many positional arguments; expected a scenario path and a JSON payload",
                    ));
                }
            }
        }
    }

    if list && (name.is_some() || input.is_some()) {
        return Err(String::from(
            "`--list` cannot be combined with a scenario path or payload",
        ));
    }

    Ok(CliOptions {
        name,
        input,
        list,
        show_help,
    })
}

fn set_once(slot: &mut Option<String>, value: String, flag: &str) -> Result<(), String> {
    if slot.is_some() {
        return Err(format!("`{flag}` may only be provided once"));
    }
    *slot = Some(value);
    Ok(())
}

fn write_usage<W>(out: &mut W) -> io::Result<()>
where
    W: Write,
{
    writeln!(
        out,
        "Usage: kvs-scenarios <SCENARIO_PATH> <JSON_PAYLOAD>\n\
         \x20      kvs-scenarios --name <SCENARIO_PATH> --input <JSON_PAYLOAD>\n\
         \x20      kvs-scenarios --list\n\
         \n\
         Scenario paths use `.` or `/` separators.\n\
         Trace records are written to stdout as JSON lines; set RUST_LOG to filter.\n\
         \n\
         Examples:\n\
         \n\
         kvs-scenarios --list\n\
         kvs-scenarios cit.snapshots.count '{{\"kvs_parameters\":{{\"instance_id\":1}},\"count\":3}}'\n\
         kvs-scenarios --name cit/supported_datatypes/values/f64 --input '{{\"kvs_parameters\":{{\"instance_id\":1}}}}'\n",
    )
}
