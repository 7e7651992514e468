use agic_api::constants::{DEFAULT_INGRESS_CLASS, INGRESS_CLASS_ANNOTATION};
use agic_core::appgw::ApplicationGateway;
use agic_core::build;
use agic_core::builder::{BuildContext, FixedClock};
use agic_core::config::CompilerConfiguration;
use agic_core::events::RecordedEvents;
use agic_core::kubernetes::InMemorySnapshot;
use chrono::Utc;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use k8s_openapi::api::core::v1::{
    EndpointAddress, EndpointPort, EndpointSubset, Endpoints, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

fn metadata(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some("bench".to_string()),
        ..ObjectMeta::default()
    }
}

fn ingress(index: usize, paths: usize) -> Ingress {
    let mut meta = metadata(&format!("ingress-{index}"));
    meta.annotations = Some(BTreeMap::from([(
        INGRESS_CLASS_ANNOTATION.to_string(),
        DEFAULT_INGRESS_CLASS.to_string(),
    )]));

    let paths = (0..paths)
        .map(|path| HTTPIngressPath {
            path: Some(format!("/api/v{path}")),
            path_type: "Prefix".to_string(),
            backend: IngressBackend {
                service: Some(IngressServiceBackend {
                    name: format!("service-{index}"),
                    port: Some(ServiceBackendPort {
                        number: Some(80),
                        ..ServiceBackendPort::default()
                    }),
                }),
                ..IngressBackend::default()
            },
        })
        .collect();

    Ingress {
        metadata: meta,
        spec: Some(IngressSpec {
            rules: Some(vec![IngressRule {
                host: Some(format!("site-{index}.example.com")),
                http: Some(HTTPIngressRuleValue { paths }),
            }]),
            ..IngressSpec::default()
        }),
        ..Ingress::default()
    }
}

fn service(index: usize) -> (Service, Endpoints) {
    let service = Service {
        metadata: metadata(&format!("service-{index}")),
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                port: 80,
                protocol: Some("TCP".to_string()),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    };
    let endpoints = Endpoints {
        metadata: metadata(&format!("service-{index}")),
        subsets: Some(vec![EndpointSubset {
            addresses: Some(
                (1..=3)
                    .map(|host| EndpointAddress {
                        ip: format!("10.0.{index}.{host}"),
                        ..EndpointAddress::default()
                    })
                    .collect(),
            ),
            ports: Some(vec![EndpointPort {
                port: 80,
                protocol: Some("TCP".to_string()),
                ..EndpointPort::default()
            }]),
            ..EndpointSubset::default()
        }]),
    };
    (service, endpoints)
}

fn snapshot(ingresses: usize) -> InMemorySnapshot {
    let mut builder = InMemorySnapshot::builder();
    for index in 0..ingresses {
        let (service, endpoints) = service(index);
        builder = builder
            .add_ingress(ingress(index, 4))
            .add_service(service)
            .add_endpoints(endpoints);
    }
    builder.build().unwrap()
}

fn benchmark_build(c: &mut Criterion) {
    let configuration = CompilerConfiguration::builder()
        .subscription_id("subscription")
        .resource_group("group")
        .gateway_name("gateway")
        .build();
    let existing = ApplicationGateway::default();
    let clock = FixedClock::new(Utc::now());

    let mut group = c.benchmark_group("build");
    for ingresses in [1, 10, 50] {
        let snapshot = snapshot(ingresses);
        group.bench_with_input(
            BenchmarkId::from_parameter(ingresses),
            &snapshot,
            |b, snapshot| {
                b.iter(|| {
                    let recorder = RecordedEvents::new();
                    let context = BuildContext::builder()
                        .configuration(&configuration)
                        .snapshot(snapshot)
                        .existing(&existing)
                        .clock(&clock)
                        .recorder(&recorder)
                        .build();
                    black_box(build(&context).unwrap())
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, benchmark_build);
criterion_main!(benches);
