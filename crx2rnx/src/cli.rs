use clap::{Arg, ArgAction, ArgMatches, ColorChoice, Command};

pub struct Cli {
    /// arguments passed by user
    pub matches: ArgMatches,
}

impl Cli {
    pub fn new() -> Self {
        Self {
            matches: {
                Command::new("crx2rnx")
                    .version(env!("CARGO_PKG_VERSION"))
                    .about("Compact RINEX decompression tool")
                    .color(ColorChoice::Always)
                    .next_help_heading("Input/Output")
                    .arg(
                        Arg::new("filepath")
                            .value_name("FILE")
                            .help("Input CRINEX file (*.??d or *.crx, optionally .gz); reads stdin and writes stdout when omitted"),
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
                    .next_help_heading("Recovery")
                    .arg(
                        Arg::new("skip")
                            .short('s')
                            .long("skip")
                            .action(ArgAction::SetTrue)
                            .help(
                                "Warn and skip strange epochs (default: stop with an error). \
                                 Useful for salvaging data when the middle of a Compact RINEX \
                                 file is missing: records stay unusable until all arcs \
                                 re-initialize at some later epoch",
                            ),
                    )
                    .arg(
                        Arg::new("output_overflow")
                            .long("output_overflow")
                            .action(ArgAction::SetTrue)
                            .help(
                                "Keep the output even when a recovered value exceeds the range \
                                 of the RINEX format (the affected records are corrupted)",
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
    pub fn output_overflow(&self) -> bool {
        self.matches.get_flag("output_overflow")
    }
}
