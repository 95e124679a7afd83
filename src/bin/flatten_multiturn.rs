use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    turns::apps::run_flatten_multiturn(std::env::args().skip(1))
}
