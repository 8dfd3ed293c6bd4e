//! File descriptors for the gRPC reflection service.
//!
//! The generated message files are committed rather than built from
//! `.proto` sources, so there is no protoc-produced descriptor set to
//! embed. The reflection service instead publishes a descriptor set
//! assembled here, covering the three query surfaces: service and method
//! symbols resolve, message symbols resolve by name.

use prost_types::{
    DescriptorProto, FileDescriptorProto, FileDescriptorSet, MethodDescriptorProto,
    ServiceDescriptorProto,
};

/// The descriptor set covering `jaeger.api_v2`, `jaeger.api_v2.metrics`
/// and `jaeger.api_v3`.
pub fn file_descriptor_set() -> FileDescriptorSet {
    FileDescriptorSet {
        file: vec![api_v2_file(), metrics_file(), api_v3_file()],
    }
}

fn message(name: &str) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_owned()),
        ..Default::default()
    }
}

fn method(
    name: &str,
    input_type: &str,
    output_type: &str,
    server_streaming: bool,
) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some(name.to_owned()),
        input_type: Some(input_type.to_owned()),
        output_type: Some(output_type.to_owned()),
        server_streaming: Some(server_streaming),
        ..Default::default()
    }
}

fn api_v2_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("jaeger_api_v2/query.proto".to_owned()),
        package: Some("jaeger.api_v2".to_owned()),
        syntax: Some("proto3".to_owned()),
        message_type: [
            "KeyValue",
            "Log",
            "SpanRef",
            "Process",
            "Span",
            "DependencyLink",
            "GetTraceRequest",
            "SpansResponseChunk",
            "ArchiveTraceRequest",
            "ArchiveTraceResponse",
            "TraceQueryParameters",
            "FindTracesRequest",
            "GetServicesRequest",
            "GetServicesResponse",
            "GetOperationsRequest",
            "Operation",
            "GetOperationsResponse",
            "FindTraceIDsRequest",
            "FindTraceIDsResponse",
            "GetDependenciesRequest",
            "GetDependenciesResponse",
        ]
        .into_iter()
        .map(message)
        .collect(),
        service: vec![ServiceDescriptorProto {
            name: Some("QueryService".to_owned()),
            method: vec![
                method(
                    "GetTrace",
                    ".jaeger.api_v2.GetTraceRequest",
                    ".jaeger.api_v2.SpansResponseChunk",
                    true,
                ),
                method(
                    "ArchiveTrace",
                    ".jaeger.api_v2.ArchiveTraceRequest",
                    ".jaeger.api_v2.ArchiveTraceResponse",
                    false,
                ),
                method(
                    "FindTraces",
                    ".jaeger.api_v2.FindTracesRequest",
                    ".jaeger.api_v2.SpansResponseChunk",
                    true,
                ),
                method(
                    "FindTraceIDs",
                    ".jaeger.api_v2.FindTraceIDsRequest",
                    ".jaeger.api_v2.FindTraceIDsResponse",
                    false,
                ),
                method(
                    "GetServices",
                    ".jaeger.api_v2.GetServicesRequest",
                    ".jaeger.api_v2.GetServicesResponse",
                    false,
                ),
                method(
                    "GetOperations",
                    ".jaeger.api_v2.GetOperationsRequest",
                    ".jaeger.api_v2.GetOperationsResponse",
                    false,
                ),
                method(
                    "GetDependencies",
                    ".jaeger.api_v2.GetDependenciesRequest",
                    ".jaeger.api_v2.GetDependenciesResponse",
                    false,
                ),
            ],
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn metrics_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("jaeger_api_v2/metricsquery.proto".to_owned()),
        package: Some("jaeger.api_v2.metrics".to_owned()),
        syntax: Some("proto3".to_owned()),
        message_type: [
            "Label",
            "GaugeValue",
            "MetricPoint",
            "Metric",
            "MetricFamily",
            "MetricsQueryBaseRequest",
            "GetLatenciesRequest",
            "GetCallRatesRequest",
            "GetErrorRatesRequest",
            "GetMinStepDurationRequest",
            "GetMinStepDurationResponse",
            "GetMetricsResponse",
        ]
        .into_iter()
        .map(message)
        .collect(),
        service: vec![ServiceDescriptorProto {
            name: Some("MetricsQueryService".to_owned()),
            method: vec![
                method(
                    "GetLatencies",
                    ".jaeger.api_v2.metrics.GetLatenciesRequest",
                    ".jaeger.api_v2.metrics.GetMetricsResponse",
                    false,
                ),
                method(
                    "GetCallRates",
                    ".jaeger.api_v2.metrics.GetCallRatesRequest",
                    ".jaeger.api_v2.metrics.GetMetricsResponse",
                    false,
                ),
                method(
                    "GetErrorRates",
                    ".jaeger.api_v2.metrics.GetErrorRatesRequest",
                    ".jaeger.api_v2.metrics.GetMetricsResponse",
                    false,
                ),
                method(
                    "GetMinStepDuration",
                    ".jaeger.api_v2.metrics.GetMinStepDurationRequest",
                    ".jaeger.api_v2.metrics.GetMinStepDurationResponse",
                    false,
                ),
            ],
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn api_v3_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("jaeger_api_v3/query_service.proto".to_owned()),
        package: Some("jaeger.api_v3".to_owned()),
        syntax: Some("proto3".to_owned()),
        message_type: [
            "GetTraceRequest",
            "SpansResponseChunk",
            "GetDependenciesRequest",
            "GetDependenciesResponse",
        ]
        .into_iter()
        .map(message)
        .collect(),
        service: vec![ServiceDescriptorProto {
            name: Some("QueryService".to_owned()),
            method: vec![
                method(
                    "GetTrace",
                    ".jaeger.api_v3.GetTraceRequest",
                    ".jaeger.api_v3.SpansResponseChunk",
                    true,
                ),
                method(
                    "GetDependencies",
                    ".jaeger.api_v3.GetDependenciesRequest",
                    ".jaeger.api_v3.GetDependenciesResponse",
                    false,
                ),
            ],
            ..Default::default()
        }],
        ..Default::default()
    }
}
