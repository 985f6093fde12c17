use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    evalset::app::run_prepare(std::env::args().skip(1))
}
