use std::error::Error;
use std::fs::File;
use std::time::Duration;

use getopts::Options;
use log::LevelFilter;
use simple_logger::SimpleLogger;

use sap1::display::{HeadlessView, PanelView, TermPanelView};
use sap1::interpreter::{Interpreter, DEFAULT_TICK};
use sap1::lcd::LcdDriver;
use sap1::memory::{PRG_COUNT, PRG_SHUFFLE};
use sap1::panel::LcdPanel;
use sap1::readout::Readout;
use sap1::timing::SpinDelay;

fn usage(program: &str, opts: &Options) {
    print!("{}", opts.usage(&format!("Usage: {} [options]", program)));
}

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    let mut opts = Options::new();
    opts.optopt("p", "program", "built-in program image to run (1 or 2)", "N");
    opts.optopt("f", "file", "load a 16-byte program image from a file", "PATH");
    opts.optopt("t", "tick", "delay between instructions in milliseconds", "MS");
    opts.optflag("", "headless", "run without the terminal front panel");
    opts.optflag("v", "verbose", "trace logging (best combined with --headless)");
    opts.optflag("h", "help", "print this help");
    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{}", e);
            usage(&args[0], &opts);
            std::process::exit(2);
        }
    };
    if matches.opt_present("h") {
        usage(&args[0], &opts);
        return Ok(());
    }

    let level = if matches.opt_present("v") {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    let tick = match matches.opt_str("t") {
        Some(ms) => Duration::from_millis(ms.parse::<u64>()?),
        None => DEFAULT_TICK,
    };

    // initialise: the controller is busy out of power-on, so bring-up runs
    // before anything else touches the bus
    let mut driver = LcdDriver::new(LcdPanel::new(), SpinDelay);
    driver.init()?;
    let mut machine = Interpreter::new(Readout::new(driver), SpinDelay, tick);

    // load a program
    match matches.opt_str("f") {
        Some(path) => {
            let mut f = File::open(path)?;
            machine.load(&mut f)?;
        }
        None => match matches.opt_str("p").as_deref() {
            None | Some("1") => machine.load_image(&PRG_COUNT),
            Some("2") => machine.load_image(&PRG_SHUFFLE),
            Some(other) => {
                eprintln!("no built-in program {}", other);
                std::process::exit(2);
            }
        },
    }

    let mut view: Box<dyn PanelView> = if matches.opt_present("headless") {
        Box::new(HeadlessView)
    } else {
        Box::new(TermPanelView::new()?)
    };

    while machine.is_running() {
        machine.step()?;
        view.draw(machine.bus())?;
    }
    drop(view);

    // shove some junk on stdout so the shell prompt doesn't eat the last frame
    for _ in 0..6 {
        println!();
    }
    Ok(())
}
