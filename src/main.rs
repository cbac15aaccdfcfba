use clap::{arg,crate_version,value_parser,Command};
use rncpack::rnc;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

const RCH: &str = "unreachable was reached";

fn ok_to_overwrite(path_out: &str) -> bool {
    if let Ok(_f) = std::fs::File::open(path_out) {
        let mut ans = String::new();
        eprint!("{} exists, overwrite? (y/n) ",path_out);
        std::io::stdin().read_line(&mut ans).expect("could not read stdin");
        if ans.trim_end()=="y" || ans.trim_end()=="Y" {
            return true;
        }
        return false;
    }
    true
}

fn main() -> STDRESULT
{
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let long_help =
"Examples:
---------
Compress:      `rncpack compress -i my_expanded -o my_packed`
Expand:        `rncpack expand -i my_packed -o my_expanded`
From archive:  `rncpack expand -i game.dat --offset 4096 -o sprite.bin`
Header:        `rncpack info -i my_packed`";

    let mut main_cmd = Command::new("rncpack")
        .about("Compress and expand RNC method 1 (ProPack) data")
        .after_long_help(long_help)
        .version(crate_version!());
    main_cmd = main_cmd.subcommand(Command::new("compress")
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .arg(arg!(--offset <BYTES> "start packing at this input offset").value_parser(value_parser!(u64))
            .required(false))
        .about("compress a file"));

    main_cmd = main_cmd.subcommand(Command::new("expand")
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .arg(arg!(--offset <BYTES> "offset of the container in the input").value_parser(value_parser!(u64))
            .required(false))
        .arg(arg!(--lenient "keep the data if only the unpacked CRC is wrong"))
        .about("expand a file"));

    main_cmd = main_cmd.subcommand(Command::new("info")
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(--offset <BYTES> "offset of the container in the input").value_parser(value_parser!(u64))
            .required(false))
        .about("show the container header"));

    let matches = main_cmd.get_matches();

    if let Some(cmd) = matches.subcommand_matches("compress") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        let mut opt = rncpack::STD_OPTIONS;
        opt.in_offset = *cmd.get_one::<u64>("offset").unwrap_or(&0);
        if !ok_to_overwrite(path_out) {
            eprintln!("abort operation");
            return Ok(());
        }
        let mut in_file = std::fs::File::open(path_in)?;
        let mut out_file = std::fs::OpenOptions::new().write(true).truncate(false).create(true).open(path_out)?;
        let (in_size,out_size) = rnc::compress(&mut in_file,&mut out_file,&opt)?;
        out_file.set_len(out_size)?;
        eprintln!("compressed {} into {}",in_size,out_size);
    }

    if let Some(cmd) = matches.subcommand_matches("expand") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        let mut opt = rncpack::STD_OPTIONS;
        opt.in_offset = *cmd.get_one::<u64>("offset").unwrap_or(&0);
        opt.strict_crc = !cmd.get_flag("lenient");
        if !ok_to_overwrite(path_out) {
            eprintln!("abort operation");
            return Ok(());
        }
        let mut in_file = std::fs::File::open(path_in)?;
        let mut out_file = std::fs::OpenOptions::new().write(true).truncate(false).create(true).open(path_out)?;
        let (in_size,out_size) = rnc::expand(&mut in_file,&mut out_file,&opt)?;
        out_file.set_len(out_size)?;
        eprintln!("expanded {} into {}",in_size,out_size);
    }

    if let Some(cmd) = matches.subcommand_matches("info") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let offset = *cmd.get_one::<u64>("offset").unwrap_or(&0) as usize;
        let dat = std::fs::read(path_in)?;
        if offset > dat.len() {
            return Err(Box::new(rncpack::Error::FileFormatMismatch));
        }
        let header = rnc::header(&dat[offset..])?;
        println!("{}",header);
    }

    Ok(())
}
