use clap::{Arg, ArgAction, ArgMatches, ColorChoice, Command};

pub struct Cli {
    /// arguments passed by user
    pub matches: ArgMatches,
}

impl Cli {
    pub fn new() -> Self {
        Self {
            matches: {
                Command::new("rnx2crx")
                    .version(env!("CARGO_PKG_VERSION"))
                    .about("RINEX observation data compressor")
                    .color(ColorChoice::Always)
                    .next_help_heading("Input/Output")
                    .arg(
                        Arg::new("filepath")
                            .value_name("FILE")
                            .help("Input RINEX file (*.??o or *.rnx, optionally .gz); reads stdin and writes stdout when omitted"),
                    )
                    .arg(
                        Arg::new("stdout")
                            .short('c')
                            .long("stdout")
                            .action(ArgAction::SetTrue)
                            .help("Write to stdout instead of the derived file name"),
                    )
                    .arg(
                        Arg::new("force")
                            .short('f')
                            .long("force")
                            .action(ArgAction::SetTrue)
                            .help("Force overwrite of the output file"),
                    )
                    .next_help_heading("Compression")
                    .arg(
                        Arg::new("skip")
                            .short('s')
                            .long("skip")
                            .action(ArgAction::SetTrue)
                            .help("Warn and skip strange epochs (default: stop with an error)"),
                    )
                    .arg(
                        Arg::new("every")
                            .short('e')
                            .long("every")
                            .value_name("N")
                            .help(
                                "Re-initialize every data arc each N epochs. When part of a \
                                 Compact RINEX file is lost, nothing can be recovered until the \
                                 arcs re-initialize; periodic initialization raises the chances \
                                 of partial recovery, at some cost in file size",
                            ),
                    )
                    .get_matches()
            },
        }
    }
    pub fn input_path(&self) -> Option<&String> {
        self.matches.get_one::<String>("filepath")
    }
    pub fn to_stdout(&self) -> bool {
        self.matches.get_flag("stdout")
    }
    pub fn force(&self) -> bool {
        self.matches.get_flag("force")
    }
    pub fn skip(&self) -> bool {
        self.matches.get_flag("skip")
    }
    pub fn every(&self) -> Option<u64> {
        self.matches
            .get_one::<String>("every")
            .and_then(|s| s.parse::<u64>().ok())
    }
}
