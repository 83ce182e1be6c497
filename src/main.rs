fn main() {
    if let Err(err) = synth_reconcile::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
