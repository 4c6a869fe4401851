fn main() {
    if let Err(err) = driftscan::run() {
        eprintln!("error: {err:#}");
        std::process::exit(driftscan::exit_code(&err));
    }
}
