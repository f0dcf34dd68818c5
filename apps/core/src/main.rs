fn main() {
    let options = match popbox_core::runtime::parse_cli_args(std::env::args_os()) {
        Ok(options) => options,
        Err(error) => error.exit(),
    };

    if let Err(error) = popbox_core::runtime::run_with_options(options) {
        eprintln!("[popbox] runtime failed: {error}");
        std::process::exit(1);
    }
}
