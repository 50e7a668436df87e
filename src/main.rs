fn main() {
    if let Err(err) = livescan_lib::run() {
        eprintln!("livescan: {err:#}");
        std::process::exit(1);
    }
}
