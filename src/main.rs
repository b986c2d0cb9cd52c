use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    dawbrei::cli::main()
}
