use anyhow::{bail, Context};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

use nmapparse::{
    config::ParserConfig,
    filter::{Filters, HostFilter},
    model::PortScope,
    output::OutputFormat,
    session::Session,
    utils::{parse_csv_list, parse_port_list, Logger},
    views::{ImportSummary, QueryViews},
};

fn build_cli() -> Command {
    Command::new("nmapparse")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Merge, filter and summarise Nmap XML scan results")
        .arg(
            Arg::new("files")
                .value_name("FILE")
                .help("Nmap XML files or directories containing them")
                .required(true)
                .num_args(1..)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORTS")
                .help("Only show these ports, comma separated (e.g. 80,443)"),
        )
        .arg(
            Arg::new("service")
                .long("service")
                .value_name("SERVICES")
                .help("Only show these services, comma separated (e.g. http,ssh)"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOSTS")
                .help("Only show these hosts, comma separated IPs or CIDR ranges"),
        )
        .arg(
            Arg::new("iplist")
                .short('l')
                .long("iplist")
                .help("Print the list of matching hosts")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("alive-hosts")
                .short('a')
                .long("alive-hosts")
                .help("Print every alive host, ignoring filters")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("service-list")
                .short('s')
                .long("service-list")
                .help("Print the list of services with their ports")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("host-summary")
                .short('S')
                .long("host-summary")
                .help("Print host totals")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print services together with the hosts offering them")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("unique-ports")
                .short('u')
                .long("unique-ports")
                .value_name("SCOPE")
                .help("Print unique open ports (tcp, udp or combined)")
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("combined")
                .value_parser(["tcp", "udp", "combined", "default"]),
        )
        .arg(
            Arg::new("raw")
                .short('R')
                .long("raw")
                .help("Only print raw output, without headings")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("recurse")
                .short('r')
                .long("recurse")
                .help("Descend into subdirectories when looking for XML files")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("combine")
                .short('c')
                .long("combine")
                .value_name("FILE")
                .help("Write all imported hosts to one combined nmapparse XML file")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .value_name("FILE")
                .help("Write all imported hosts to a JSON file")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("imported-files")
                .long("imported-files")
                .help("List imported and failed files")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("cmdline")
                .long("cmdline")
                .help("Print the nmap command lines recorded in the imported files")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Configuration file (default: ~/.nmapparse.toml)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level: off, error, warn, info, debug, trace")
                .value_parser(["off", "error", "warn", "info", "debug", "trace"]),
        )
}

fn build_filters(matches: &ArgMatches, config: &ParserConfig) -> anyhow::Result<Filters> {
    let mut filters = config.default_filters();
    if let Some(raw) = matches.get_one::<String>("port") {
        let ports = parse_port_list(raw);
        if ports.is_empty() {
            bail!("No valid ports in port filter: {}", raw);
        }
        filters = filters.with_ports(ports);
    }
    if let Some(services) = matches.get_one::<String>("service") {
        filters = filters.with_services(parse_csv_list(services));
    }
    if let Some(raw) = matches.get_one::<String>("host") {
        let hosts = HostFilter::from_csv(raw);
        if hosts.is_empty() {
            bail!("No valid IPs or CIDR ranges in host filter: {}", raw);
        }
        filters = filters.with_hosts(hosts);
    }
    Ok(filters)
}

fn heading(raw: bool, title: &str) {
    if !raw {
        println!("\n{}\n{}", title, "-".repeat(title.len()));
    }
}

fn print_hosts(views: &QueryViews, filters: &Filters, raw: bool) {
    heading(raw, "Hosts");
    for host in views.hosts(filters) {
        if raw || !host.has_hostname() {
            println!("{}", host.ip);
        } else {
            println!("{} ({})", host.ip, host.hostname);
        }
    }
}

fn print_unique_ports(views: &QueryViews, scope: PortScope, filters: &Filters, raw: bool) {
    let title = match scope {
        PortScope::Tcp => "Unique TCP ports",
        PortScope::Udp => "Unique UDP ports",
        PortScope::Combined => "Unique ports",
    };
    heading(raw, title);
    let ports: Vec<String> = views.unique_port_ids(scope, filters)
        .iter()
        .map(|p| p.to_string())
        .collect();
    println!("{}", ports.join(","));
}

fn print_alive_hosts(views: &QueryViews, raw: bool) {
    heading(raw, "Alive hosts");
    for ip in views.all_alive_hosts() {
        println!("{}", ip);
    }
}

fn print_services(views: &QueryViews, filters: &Filters, verbose: bool, raw: bool) {
    heading(raw, "Services");
    for service in views.services(filters) {
        let ports: Vec<String> = service.ports.iter().map(|p| p.to_string()).collect();
        if raw && !verbose {
            println!("{}", service.name);
            continue;
        }
        println!("{} [{}]", service.name, ports.join(","));

        if verbose {
            for host in &service.hosts {
                let host_ports: Vec<String> = host.ports.iter()
                    .filter(|p| p.service == service.name && service.ports.contains(&p.port_id))
                    .map(|p| p.to_string())
                    .collect();
                println!("    {} {}", host.ip, host_ports.join(" "));
            }
        }
    }
}

fn print_import_summary(summary: &ImportSummary, list_files: bool, raw: bool) {
    if list_files {
        heading(raw, "Import Summary");
        for file in &summary.imported_files {
            println!("{}", file);
        }
        if !summary.failed_files.is_empty() {
            heading(raw, "Failed to import");
            for file in &summary.failed_files {
                println!("{}", file);
            }
        }
    } else if !raw {
        println!("Successfully loaded {} file(s)", summary.imported_count);
        if summary.failed_count > 0 {
            println!("Failed to load {} file(s): {}", summary.failed_count, summary.failed_files.join(", "));
        }
        if summary.skipped_hosts > 0 {
            println!("Skipped {} host(s) without an address", summary.skipped_hosts);
        }
    }
}

fn main() -> anyhow::Result<()> {
    let matches = build_cli().get_matches();

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ParserConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ParserConfig::load_default_config(),
    };

    let level = match matches.get_one::<String>("log-level") {
        Some(level) => level.parse().unwrap_or(log::LevelFilter::Warn),
        None => config.log_level_filter(),
    };
    Logger::init(level);

    let raw = matches.get_flag("raw");
    let verbose = matches.get_flag("verbose");
    let recurse = matches.get_flag("recurse") || config.recurse;
    let filters = build_filters(&matches, &config)?;
    if !raw && (filters.ports_filtered() || filters.services_filtered() || filters.hosts_filtered()) {
        println!("Filters: {}", filters);
    }

    let paths: Vec<PathBuf> = matches
        .get_many::<PathBuf>("files")
        .map(|files| files.cloned().collect())
        .unwrap_or_default();

    let mut session = Session::with_config(&config);
    let result = session.ingest(&paths, recurse).context("Failed to import scan files")?;
    if result.imported.is_empty() && result.failed.is_empty() && result.already_imported.is_empty() {
        bail!("No Nmap XML files found");
    }

    let summary = session.import_summary();
    print_import_summary(&summary, false, raw);
    if matches.get_flag("imported-files") {
        print_import_summary(&summary, true, raw);
    }

    let default_action = !matches.get_flag("iplist")
        && !matches.get_flag("alive-hosts")
        && !matches.get_flag("service-list")
        && !verbose
        && !matches.get_flag("cmdline")
        && !matches.get_flag("imported-files")
        && !matches.contains_id("unique-ports")
        && !matches.contains_id("combine")
        && !matches.contains_id("json");

    if let Some(path) = matches.get_one::<PathBuf>("combine") {
        session.export_combined(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !raw {
            println!("Combined file saved to {}", path.display());
        }
    }

    if let Some(path) = matches.get_one::<PathBuf>("json") {
        session.export(path, OutputFormat::Json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !raw {
            println!("JSON file saved to {}", path.display());
        }
    }

    let views = session.views();

    if default_action {
        let everything = Filters::unrestricted();
        print_hosts(&views, &everything, raw);
        print_unique_ports(&views, PortScope::Combined, &everything, raw);
    }

    if matches.get_flag("iplist") {
        print_hosts(&views, &filters, raw);
    }

    if let Some(scope) = matches.get_one::<String>("unique-ports") {
        let scope: PortScope = scope.parse().map_err(anyhow::Error::msg)?;
        print_unique_ports(&views, scope, &filters, raw);
    }

    // Alive hosts are listed regardless of the port, service and host filters
    if matches.get_flag("alive-hosts") {
        print_alive_hosts(&views, raw);
    }

    if matches.get_flag("service-list") || verbose {
        print_services(&views, &filters, verbose, raw);
    }

    if matches.get_flag("cmdline") {
        heading(raw, "Nmap command lines");
        for (file, args) in session.registry().nmap_cmdlines() {
            if raw {
                println!("{}", args);
            } else {
                println!("{}: {}", file, args);
            }
        }
    }

    if !raw && (default_action || matches.get_flag("host-summary")) {
        heading(raw, "Summary");
        println!("Total hosts: {}", session.registry().len());
        println!("Alive hosts: {}", views.alive_hosts(&filters).len());
    }

    Ok(())
}
