use wirequeue_frame::{DEFAULT_MAX_MESSAGE, HEADER_SIZE};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("wirequeue {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: wirequeue");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("WIREQUEUE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("header_size: {HEADER_SIZE}");
    println!("default_max_message: {DEFAULT_MAX_MESSAGE}");
    println!("features: async={}, cli=true", cfg!(feature = "async"));

    Ok(SUCCESS)
}
