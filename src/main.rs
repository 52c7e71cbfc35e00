fn main() {
    if let Err(err) = report_normalizer::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
