use std::env;
use std::process::exit;
use std::time::Duration;

use getopts::Options;

use iris::DnsResolver;

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("usage: {} [options] DOMAIN", program);
    print!("{}", opts.usage(&brief));
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optopt("s", "server", "nameserver to query (host[:port])", "SERVER");
    opts.optopt("t", "timeout", "seconds to wait for a response", "SECS");
    opts.optflag("h", "help", "print this help menu");

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{}", e);
            exit(1);
        }
    };

    if matches.opt_present("h") || matches.free.is_empty() {
        print_usage(&program, &opts);
        exit(if matches.opt_present("h") { 0 } else { 1 });
    }

    let domain = &matches.free[0];

    let timeout = matches
        .opt_str("t")
        .and_then(|secs| secs.parse::<f64>().ok())
        .filter(|secs| *secs > 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or_else(|| Duration::from_secs(5));

    let resolver = match matches.opt_str("s") {
        Some(server) => DnsResolver::with_server(&server),
        None => DnsResolver::new(),
    };

    match resolver.lookup(domain, Some(timeout)).await {
        Ok(addrs) => {
            if addrs.is_empty() {
                println!("no addresses found for {}", domain);
            }
            for addr in addrs {
                println!("{}", addr);
            }
        }
        Err(e) => {
            eprintln!("lookup of {} failed: {}", domain, e);
            exit(1);
        }
    }
}
