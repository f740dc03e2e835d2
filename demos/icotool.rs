use clap::{App, Arg, SubCommand};
use icocur::{Decoder, Encoder, Hotspot, IconImage, ResourceType};
use std::fs;
use std::io::Cursor;
use std::path::PathBuf;

//===========================================================================//

fn main() {
    let matches = App::new("icotool")
        .version("0.1")
        .about("Manipulates ICO and CUR files")
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .global(true)
                .help("Logs what the codec is doing"),
        )
        .subcommand(
            SubCommand::with_name("create")
                .about("Creates an ICO or CUR file from PNG files")
                .arg(
                    Arg::with_name("output")
                        .takes_value(true)
                        .value_name("PATH")
                        .short("o")
                        .long("output")
                        .help("Sets output path"),
                )
                .arg(
                    Arg::with_name("hotspot")
                        .takes_value(true)
                        .value_name("X,Y")
                        .long("hotspot")
                        .help("Writes a cursor with this hotspot"),
                )
                .arg(Arg::with_name("image").multiple(true)),
        )
        .subcommand(
            SubCommand::with_name("extract")
                .about("Extracts an image from an ICO or CUR file")
                .arg(
                    Arg::with_name("output")
                        .takes_value(true)
                        .value_name("PATH")
                        .short("o")
                        .long("output")
                        .help("Sets output path"),
                )
                .arg(Arg::with_name("file").required(true))
                .arg(Arg::with_name("index").required(true)),
        )
        .subcommand(
            SubCommand::with_name("list")
                .about("Lists the images in an ICO or CUR file")
                .arg(Arg::with_name("file").required(true)),
        )
        .get_matches();

    let filter = if matches.is_present("verbose") {
        tracing::level_filters::LevelFilter::TRACE
    } else {
        tracing::level_filters::LevelFilter::INFO
    };
    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(filter.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if let Some(submatches) = matches.subcommand_matches("create") {
        let hotspot = submatches.value_of("hotspot").map(parse_hotspot);
        let (restype, extension) = match hotspot {
            Some(_) => (ResourceType::Cursor, "cur"),
            None => (ResourceType::Icon, "ico"),
        };
        let out_path = if let Some(path) = submatches.value_of("output") {
            PathBuf::from(path)
        } else {
            let mut path = PathBuf::from(format!("out.{}", extension));
            let mut index: i32 = 0;
            while path.exists() {
                index += 1;
                path = PathBuf::from(format!("out{}.{}", index, extension));
            }
            path
        };
        let out_file = fs::File::create(out_path).unwrap();
        let mut encoder = Encoder::new(out_file, restype);
        if let Some(paths) = submatches.values_of("image") {
            for path in paths {
                println!("Adding {:?}", path);
                let file = fs::File::open(path).unwrap();
                let image = IconImage::read_png(file).unwrap();
                encoder.add(&image, hotspot.unwrap_or_default()).unwrap();
            }
        }
        encoder.finish().unwrap();
    } else if let Some(submatches) = matches.subcommand_matches("extract") {
        let path = submatches.value_of("file").unwrap();
        let mut decoder = open(path);
        let index = submatches.value_of("index").unwrap();
        let index = index.parse::<usize>().unwrap();
        let image = decoder.decode(index).unwrap();
        let out_path = if let Some(path) = submatches.value_of("output") {
            PathBuf::from(path)
        } else {
            PathBuf::from(format!("{}.{}.png", path, index))
        };
        let out_file = fs::File::create(out_path).unwrap();
        image.write_png(out_file).unwrap();
    } else if let Some(submatches) = matches.subcommand_matches("list") {
        let path = submatches.value_of("file").unwrap();
        let decoder = open(path);
        println!("Resource type: {:?}", decoder.resource_type());
        for (index, entry) in decoder.entries().iter().enumerate() {
            let kind = if entry.is_png() { "PNG" } else { "BMP" };
            let suffix = if let Some(hotspot) = entry.cursor_hotspot() {
                format!("hotspot at ({}, {})", hotspot.x, hotspot.y)
            } else {
                format!("{} bpp", entry.bits_per_pixel())
            };
            let best = if index == decoder.best() { " (best)" } else { "" };
            println!(
                "{:5}: {}x{} {}, {}{}",
                index,
                entry.width(),
                entry.height(),
                kind,
                suffix,
                best
            );
        }
    }
}

fn open(path: &str) -> Decoder<Cursor<Vec<u8>>> {
    let data = fs::read(path).unwrap();
    let restype = icocur::guess_resource_type(&data)
        .unwrap_or_else(|| panic!("{:?} is neither an ICO nor a CUR file", path));
    Decoder::new(Cursor::new(data), restype).unwrap()
}

fn parse_hotspot(value: &str) -> Hotspot {
    let mut parts = value.split(',').map(|part| part.trim().parse::<u16>().unwrap());
    match (parts.next(), parts.next(), parts.next()) {
        (Some(x), Some(y), None) => Hotspot { x, y },
        _ => panic!("hotspot must be given as X,Y (got {:?})", value),
    }
}

//===========================================================================//
