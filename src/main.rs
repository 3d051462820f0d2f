#![recursion_limit = "1024"] // for error_chain

#[macro_use]
extern crate log;
#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate glium;

#[macro_use]
mod errors;
#[macro_use]
mod util;
#[macro_use]
mod binary;
#[macro_use]
mod gx;
mod j3d;
mod logger;
mod version;
mod settings;
mod scene;
mod render;
mod export;
mod editor;
mod viewer;

use clap::{App, Arg};
use std::path::Path;
use std::process::exit;

fn main() {
    let version = version::version_string();
    let matches = App::new("j3dview")
        .version(&version[..])
        .about("Viewer and editor for J3D models (BMD/BDL)")
        .after_help(viewer::CONTROL_HELP)
        .arg(Arg::with_name("FILE")
            .help("Model file to open (.bmd or .bdl)"))
        .arg(Arg::with_name("logfile")
            .long("logfile")
            .value_name("PATH")
            .takes_value(true)
            .help("Also write verbose logs to PATH"))
        .get_matches();

    let logfile = matches.value_of_os("logfile").map(Path::new);
    logger::init(log::Level::Warn, logfile);
    debug!("j3dview {}", version);

    if let Err(e) = run(matches.value_of_os("FILE").map(Path::new)) {
        error!("{}", e);
        for cause in e.iter().skip(1) {
            error!("  caused by: {}", cause);
        }
        exit(1);
    }
}

fn run(path: Option<&Path>) -> errors::Result<()> {
    let settings = settings::Settings::load();
    let editor = match path {
        Some(path) => Some(editor::Editor::open(path)?),
        None => None,
    };
    viewer::main(editor, settings)
}
