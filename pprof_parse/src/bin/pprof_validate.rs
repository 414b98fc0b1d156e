use pprof_parse::Profile;
use std::env;
use std::fs::File;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.len() != 2 {
        eprintln!("Usage: {} <profile.pprof>", args[0]);
        return ExitCode::from(2);
    }

    let path = &args[1];

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening '{}': {}", path, e);
            return ExitCode::FAILURE;
        }
    };

    match Profile::parse(file) {
        Ok(profile) => {
            println!("Valid pprof profile: {}", path);
            for (idx, sample_type) in profile.sample_types.iter().enumerate() {
                println!(
                    "  Sample type {}: {} ({}), total {}",
                    idx,
                    sample_type.kind,
                    sample_type.unit,
                    profile.total(idx)
                );
            }
            println!("  Functions: {}", profile.functions.len());
            println!("  Samples: {}", profile.samples.len());
            if profile.duration_nanos > 0 {
                println!("  Duration: {}ns", profile.duration_nanos);
            }
            for comment in &profile.comments {
                println!("  Comment: {}", comment);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Invalid pprof profile '{}': {}", path, e);
            ExitCode::FAILURE
        }
    }
}
