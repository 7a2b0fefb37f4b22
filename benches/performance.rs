//! Performance benchmarks for nmapparse

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nmapparse::{
    filter::{Filters, HostFilter},
    ingest::{parse_scan, XmlIngester},
    model::PortScope,
    registry::Registry,
    views::QueryViews,
};

/// Build an nmaprun document with `hosts` alive hosts and a few open ports each
fn synthetic_scan(hosts: usize) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<nmaprun args=\"nmap -sV bench\">\n");
    for i in 0..hosts {
        let ip = format!("10.{}.{}.{}", (i >> 16) & 0xff, (i >> 8) & 0xff, i & 0xff);
        xml.push_str(&format!(
            "<host><status state=\"up\"/><address addr=\"{}\" addrtype=\"ipv4\"/><ports>",
            ip
        ));
        for (port, service) in [(22, "ssh"), (80, "http"), (443, "https")] {
            xml.push_str(&format!(
                "<port protocol=\"tcp\" portid=\"{}\"><state state=\"open\"/><service name=\"{}\"/></port>",
                port + (i % 7) as u16,
                service
            ));
        }
        xml.push_str("</ports></host>\n");
    }
    xml.push_str("</nmaprun>\n");
    xml
}

fn registry_with(hosts: usize) -> Registry {
    let mut registry = Registry::new();
    for batch in 0..4 {
        let doc = parse_scan(&synthetic_scan(hosts), "bench.xml").unwrap();
        XmlIngester::default().merge_document(&mut registry, &format!("bench-{}.xml", batch), doc);
    }
    registry
}

/// Benchmark XML parsing and registry merge
fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest");

    for size in [100, 1000, 5000] {
        let xml = synthetic_scan(size);
        group.bench_with_input(BenchmarkId::new("parse", size), &xml, |b, xml| {
            b.iter(|| black_box(parse_scan(black_box(xml), "bench.xml").unwrap()))
        });

        group.bench_with_input(BenchmarkId::new("parse_and_merge", size), &xml, |b, xml| {
            b.iter(|| {
                let mut registry = Registry::new();
                let doc = parse_scan(xml, "bench.xml").unwrap();
                XmlIngester::default().merge_document(&mut registry, "bench.xml", doc);
                black_box(registry)
            })
        });
    }

    group.finish();
}

/// Benchmark filtered queries over a merged registry
fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("queries");
    let registry = registry_with(5000);
    let views = QueryViews::new(&registry);

    let unrestricted = Filters::unrestricted();
    let by_port = Filters::default().with_ports(vec![80, 443]);
    let by_subnet = Filters::default().with_hosts(HostFilter::parse(&["10.0.4.0/22"]));

    group.bench_function("hosts_unrestricted", |b| {
        b.iter(|| black_box(views.hosts(&unrestricted)))
    });
    group.bench_function("hosts_port_filter", |b| {
        b.iter(|| black_box(views.hosts(&by_port)))
    });
    group.bench_function("hosts_cidr_filter", |b| {
        b.iter(|| black_box(views.hosts(&by_subnet)))
    });
    group.bench_function("unique_ports_combined", |b| {
        b.iter(|| black_box(views.unique_port_ids(PortScope::Combined, &unrestricted)))
    });
    group.bench_function("services", |b| {
        b.iter(|| black_box(views.services(&by_port)))
    });

    group.finish();
}

criterion_group!(benches, bench_ingest, bench_queries);
criterion_main!(benches);
