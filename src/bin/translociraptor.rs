use anyhow::Result;
use log::LevelFilter;
use structopt::StructOpt;

use translociraptor::cli::{run, Translociraptor};

pub fn main() -> Result<()> {
    let opt = Translociraptor::from_args();
    let level = if opt.verbose() {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    fern::Dispatch::new()
        .format(|out, message, _| out.finish(format_args!("{}", message)))
        .level(level)
        .chain(std::io::stderr())
        .apply()?;

    run(opt)
}
