fn main() -> Result<(), Box<dyn std::error::Error>> {
    keipes::cli::main()
}
