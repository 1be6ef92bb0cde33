//! Command-line argument parsing and processing.
//!
//! Hand-rolled parsing producing a [`CliAction`]; unknown options fall
//! through to help with a failure exit code rather than being ignored.

/// What the invocation asked for.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the sync daemon.
    Run {
        debug_enabled: bool,
        config_dir: Option<String>,
        /// `--simulate [START_MINUTE [SPEED]]`: force sim mode, overriding
        /// the config file.
        simulate: Option<(Option<u32>, Option<f64>)>,
    },
    /// Display help information and exit.
    ShowHelp,
    /// Display version information and exit.
    ShowVersion,
    /// Show help due to unknown arguments and exit with failure.
    ShowHelpDueToError(String),
}

/// Parsed command-line arguments.
#[derive(Debug)]
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse from an argument iterator (without the program name).
    pub fn parse<I: Iterator<Item = String>>(args: I) -> Self {
        let args: Vec<String> = args.collect();
        let mut debug_enabled = false;
        let mut config_dir = None;
        let mut simulate = None;

        let mut iter = args.iter().peekable();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-h" | "--help" => return Self::action(CliAction::ShowHelp),
                "-V" | "--version" => return Self::action(CliAction::ShowVersion),
                "-d" | "--debug" => debug_enabled = true,
                "-c" | "--config" => match iter.next() {
                    Some(dir) => config_dir = Some(dir.clone()),
                    None => {
                        return Self::action(CliAction::ShowHelpDueToError(
                            "--config requires a directory argument".to_string(),
                        ));
                    }
                },
                "-s" | "--simulate" => {
                    let start = take_number::<u32, _>(&mut iter);
                    let speed = if start.is_some() {
                        take_number::<f64, _>(&mut iter)
                    } else {
                        None
                    };
                    simulate = Some((start, speed));
                }
                other => {
                    return Self::action(CliAction::ShowHelpDueToError(format!(
                        "unknown argument: {other}"
                    )));
                }
            }
        }

        Self::action(CliAction::Run {
            debug_enabled,
            config_dir,
            simulate,
        })
    }

    fn action(action: CliAction) -> Self {
        Self { action }
    }
}

/// Consume the next argument if it parses as the expected number type;
/// otherwise leave it for the main loop to reject as unrecognized.
fn take_number<'a, T: std::str::FromStr, I: Iterator<Item = &'a String>>(
    iter: &mut std::iter::Peekable<I>,
) -> Option<T> {
    let value = iter.peek().and_then(|arg| arg.parse::<T>().ok())?;
    iter.next();
    Some(value)
}

/// Print usage information.
pub fn display_help() {
    log_version!();
    log_block_start!("Usage: cablight [OPTIONS]");
    log_indented!("-d, --debug                 Enable debug output");
    log_indented!("-c, --config <DIR>          Use an alternate config directory");
    log_indented!("-s, --simulate [START [SPEED]]");
    log_indented!("                            Simulate a game day (minutes since midnight,");
    log_indented!("                            game-minutes per second) without the game");
    log_indented!("-h, --help                  Print help");
    log_indented!("-V, --version               Print version");
    log_end!();
}

/// Print version information.
pub fn display_version() {
    log_version!();
    log_block_start!("Sync a smart light with the in-game clock of ETS2/ATS");
    log_end!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliAction {
        ParsedArgs::parse(args.iter().map(|s| s.to_string())).action
    }

    #[test]
    fn no_args_runs_with_defaults() {
        assert_eq!(
            parse(&[]),
            CliAction::Run {
                debug_enabled: false,
                config_dir: None,
                simulate: None,
            }
        );
    }

    #[test]
    fn parses_debug_and_config() {
        assert_eq!(
            parse(&["--debug", "--config", "/tmp/cfg"]),
            CliAction::Run {
                debug_enabled: true,
                config_dir: Some("/tmp/cfg".to_string()),
                simulate: None,
            }
        );
    }

    #[test]
    fn simulate_accepts_optional_start_and_speed() {
        assert_eq!(
            parse(&["--simulate"]),
            CliAction::Run {
                debug_enabled: false,
                config_dir: None,
                simulate: Some((None, None)),
            }
        );
        assert_eq!(
            parse(&["--simulate", "360", "120"]),
            CliAction::Run {
                debug_enabled: false,
                config_dir: None,
                simulate: Some((Some(360), Some(120.0))),
            }
        );
    }

    #[test]
    fn simulate_rejects_a_fractional_start() {
        // A non-integer start is not consumed; it falls through and is
        // rejected as an unknown argument instead of being truncated.
        assert!(matches!(
            parse(&["--simulate", "359.9"]),
            CliAction::ShowHelpDueToError(_)
        ));
    }

    #[test]
    fn help_and_version_short_circuit() {
        assert_eq!(parse(&["--help", "--debug"]), CliAction::ShowHelp);
        assert_eq!(parse(&["-V"]), CliAction::ShowVersion);
    }

    #[test]
    fn unknown_arguments_surface_help_error() {
        assert!(matches!(
            parse(&["--frobnicate"]),
            CliAction::ShowHelpDueToError(_)
        ));
        assert!(matches!(
            parse(&["--config"]),
            CliAction::ShowHelpDueToError(_)
        ));
    }
}
