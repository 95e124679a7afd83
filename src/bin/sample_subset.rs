use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    turns::apps::run_sample_subset(std::env::args().skip(1))
}
