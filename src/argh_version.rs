//! `argh::from_env` with a top-level `--version` flag.

use std::{ffi::OsStr, path::Path};

use argh::TopLevelCommand;

fn command_name(path: &str) -> &str {
    Path::new(path).file_name().and_then(OsStr::to_str).unwrap_or(path)
}

pub fn from_env<T: TopLevelCommand>() -> T {
    let strings: Vec<String> = std::env::args().collect();
    let cmd = strings.first().map(|s| command_name(s)).unwrap_or(env!("CARGO_PKG_NAME"));
    let args: Vec<&str> = strings.iter().skip(1).map(String::as_str).collect();
    if args == ["--version"] {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }
    T::from_args(&[cmd], &args).unwrap_or_else(|early_exit| {
        std::process::exit(match early_exit.status {
            Ok(()) => {
                println!("{}", early_exit.output);
                0
            }
            Err(()) => {
                eprintln!("{}\nRun {cmd} --help for more information.", early_exit.output);
                1
            }
        })
    })
}
