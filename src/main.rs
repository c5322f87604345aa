use doping::cli;

fn main() -> anyhow::Result<()> {
    if let Err(e) = cli::run() {
        let msg = e.to_string();
        // Diagnostics for these were already printed.
        if msg.contains(cli::RENDER_FAILED) || msg.contains(cli::INVALID_PARAMETERS) {
            std::process::exit(1);
        }
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use doping::cli::{Command, DopingCli};

    #[test]
    fn build_command_takes_params_and_compiler() {
        let cli = DopingCli::parse_from([
            "doping",
            "build",
            "loops/mm.c",
            "-p",
            "N:64",
            "--cc",
            "gcc -O3",
            "--keep",
        ]);
        match cli.command() {
            Command::Build {
                path,
                params,
                cc,
                keep,
            } => {
                assert_eq!(path.to_string_lossy(), "loops/mm.c");
                assert_eq!(params, "N:64");
                assert_eq!(cc, "gcc -O3");
                assert!(*keep);
            }
            other => panic!("expected build command, got {other:?}"),
        }
    }

    #[test]
    fn run_command_defaults_to_system_compiler() {
        let cli = DopingCli::parse_from(["doping", "run", "loop.c"]);
        match cli.command() {
            Command::Run {
                params,
                cc,
                iteration,
                ..
            } => {
                assert!(params.is_empty());
                assert_eq!(cc, doping::config::DEFAULT_COMPILER);
                assert_eq!(*iteration, 0);
            }
            other => panic!("expected run command, got {other:?}"),
        }
    }
}
