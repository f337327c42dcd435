fn main() {
    if let Err(e) = reality::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
