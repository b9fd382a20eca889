use std::env;
use std::process;

use tinypl::compile;

fn main() {
  let args: Vec<String> = env::args().collect();
  if args.len() != 2 {
    let program = args.first().map(String::as_str).unwrap_or("tinypl");
    eprintln!("usage: {program} <program>");
    process::exit(1);
  }

  match compile(&args[1]) {
    Ok(listing) => print!("{listing}"),
    Err(err) => {
      eprintln!("{err}");
      process::exit(1);
    }
  }
}
