use std::env;

use castepbin::Result;

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "castep.check".to_owned());
    let sections: Vec<String> = args.collect();
    let names: Vec<&str> = sections.iter().map(String::as_str).collect();

    let requested = (!names.is_empty()).then_some(names.as_slice());
    let d = castepbin::decode_path(&path, requested)?;

    println!("{path}: {:?}-endian, {} sections", d.endian(), d.offsets().len());
    for (name, value) in d.iter() {
        println!("{name:<36} {:<14} {:?}", value.type_name(), value.shape());
    }
    for w in d.warnings() {
        println!("warning: {w}");
    }

    Ok(())
}
