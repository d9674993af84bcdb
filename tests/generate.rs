//! End-to-end generation tests over a small assembled model.

use std::io::Write;

use harbor_codegen::{
    config::{GenSettings, ModelSource},
    middleware::{Middleware, MiddlewareStackStep},
    sources_to_model, Generator,
};

/// Smithy JSON AST for a sample service covering labels, greedy labels,
/// query/header/prefix-header bindings, unions, enums, sparse lists,
/// recursive structures, and a modeled error.
const SAMPLE_MODEL: &str = r##"{
    "smithy": "1.0",
    "shapes": {
        "harbor.protocols#restJson": {
            "type": "structure",
            "traits": { "smithy.api#trait": {} }
        },
        "example.sample#SampleService": {
            "type": "service",
            "version": "2023-01-01",
            "operations": [
                { "target": "example.sample#GetThing" },
                { "target": "example.sample#ListThings" },
                { "target": "example.sample#PutFile" },
                { "target": "example.sample#Ping" },
                { "target": "example.sample#GetTree" }
            ],
            "traits": {
                "harbor.protocols#restJson": {},
                "smithy.api#documentation": "A sample service."
            }
        },
        "example.sample#GetThing": {
            "type": "operation",
            "input": { "target": "example.sample#GetThingInput" },
            "output": { "target": "example.sample#GetThingOutput" },
            "errors": [
                { "target": "example.sample#InvalidGreeting" }
            ],
            "traits": {
                "smithy.api#http": { "method": "GET", "uri": "/things/{id}", "code": 200 }
            }
        },
        "example.sample#GetThingInput": {
            "type": "structure",
            "members": {
                "id": {
                    "target": "smithy.api#String",
                    "traits": { "smithy.api#httpLabel": {}, "smithy.api#required": {} }
                },
                "choice": { "target": "example.sample#Choice" }
            }
        },
        "example.sample#GetThingOutput": {
            "type": "structure",
            "members": {
                "name": { "target": "smithy.api#String" },
                "tag": {
                    "target": "smithy.api#String",
                    "traits": { "smithy.api#httpHeader": "X-Tag" }
                },
                "created": {
                    "target": "smithy.api#Timestamp",
                    "traits": { "smithy.api#httpHeader": "X-Created" }
                },
                "status": { "target": "example.sample#ThingStatus" }
            }
        },
        "example.sample#ListThings": {
            "type": "operation",
            "input": { "target": "example.sample#ListThingsInput" },
            "output": { "target": "example.sample#ListThingsOutput" },
            "traits": {
                "smithy.api#http": { "method": "GET", "uri": "/things?sort=asc", "code": 200 }
            }
        },
        "example.sample#ListThingsInput": {
            "type": "structure",
            "members": {
                "items": {
                    "target": "example.sample#IntegerList",
                    "traits": { "smithy.api#httpQuery": "x" }
                },
                "since": {
                    "target": "smithy.api#Timestamp",
                    "traits": { "smithy.api#httpQuery": "since" }
                },
                "tags": {
                    "target": "example.sample#TagMap",
                    "traits": { "smithy.api#httpPrefixHeaders": "X-Tag-" }
                }
            }
        },
        "example.sample#ListThingsOutput": {
            "type": "structure",
            "members": {
                "names": { "target": "example.sample#SparseNames" }
            }
        },
        "example.sample#PutFile": {
            "type": "operation",
            "input": { "target": "example.sample#PutFileInput" },
            "output": { "target": "example.sample#PutFileOutput" },
            "traits": {
                "smithy.api#http": { "method": "POST", "uri": "/files/{path+}", "code": 201 }
            }
        },
        "example.sample#PutFileInput": {
            "type": "structure",
            "members": {
                "path": {
                    "target": "smithy.api#String",
                    "traits": { "smithy.api#httpLabel": {}, "smithy.api#required": {} }
                },
                "meta": {
                    "target": "example.sample#JsonString",
                    "traits": { "smithy.api#httpHeader": "X-J" }
                },
                "data": { "target": "smithy.api#String" }
            }
        },
        "example.sample#PutFileOutput": {
            "type": "structure",
            "members": {}
        },
        "example.sample#Ping": {
            "type": "operation",
            "input": { "target": "example.sample#PingInput" },
            "output": { "target": "example.sample#PingOutput" },
            "traits": {
                "smithy.api#http": { "method": "POST", "uri": "/ping", "code": 200 }
            }
        },
        "example.sample#PingInput": {
            "type": "structure",
            "members": {}
        },
        "example.sample#PingOutput": {
            "type": "structure",
            "members": {}
        },
        "example.sample#GetTree": {
            "type": "operation",
            "input": { "target": "example.sample#GetTreeInput" },
            "output": { "target": "example.sample#GetTreeOutput" },
            "traits": {
                "smithy.api#http": { "method": "GET", "uri": "/tree", "code": 200 }
            }
        },
        "example.sample#GetTreeInput": {
            "type": "structure",
            "members": {}
        },
        "example.sample#GetTreeOutput": {
            "type": "structure",
            "members": {
                "tree": { "target": "example.sample#Tree" }
            }
        },
        "example.sample#Tree": {
            "type": "structure",
            "members": {
                "name": { "target": "smithy.api#String" },
                "child": { "target": "example.sample#Tree" }
            }
        },
        "example.sample#Choice": {
            "type": "union",
            "members": {
                "str": { "target": "smithy.api#String" },
                "tree": { "target": "example.sample#Tree" }
            }
        },
        "example.sample#ThingStatus": {
            "type": "string",
            "traits": {
                "smithy.api#enum": [
                    { "value": "AVAILABLE", "name": "AVAILABLE" },
                    { "value": "PENDING" }
                ]
            }
        },
        "example.sample#JsonString": {
            "type": "string",
            "traits": { "smithy.api#mediaType": "application/json" }
        },
        "example.sample#IntegerList": {
            "type": "list",
            "member": { "target": "smithy.api#Integer" }
        },
        "example.sample#SparseNames": {
            "type": "list",
            "member": { "target": "smithy.api#String" },
            "traits": { "smithy.api#sparse": {} }
        },
        "example.sample#TagMap": {
            "type": "map",
            "key": { "target": "smithy.api#String" },
            "value": { "target": "smithy.api#String" }
        },
        "example.sample#InvalidGreeting": {
            "type": "structure",
            "members": {
                "message": { "target": "smithy.api#String" }
            },
            "traits": { "smithy.api#error": "client" }
        }
    }
}"##;

fn settings() -> GenSettings {
    GenSettings::new(
        "example.sample#SampleService",
        "sample_service",
        "SampleService",
    )
}

fn load_model(dir: &std::path::Path) -> atelier_core::model::Model {
    let model_path = dir.join("sample.json");
    let mut file = std::fs::File::create(&model_path).unwrap();
    file.write_all(SAMPLE_MODEL.as_bytes()).unwrap();
    sources_to_model(&[ModelSource::from_file(model_path)], dir).unwrap()
}

fn generate() -> harbor_codegen::manifest::FileManifest {
    let dir = tempfile::tempdir().unwrap();
    let model = load_model(dir.path());
    Generator::new().generate(&model, &settings()).unwrap()
}

fn file(manifest: &harbor_codegen::manifest::FileManifest, stem: &str) -> String {
    let path = format!("sample_service/lib/sample_service/{}.rb", stem);
    let bytes = manifest
        .get(&path)
        .unwrap_or_else(|| panic!("missing {}", path));
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[test]
fn emits_the_full_gem_layout() {
    let manifest = generate();
    for stem in [
        "builders",
        "parsers",
        "stubs",
        "errors",
        "types",
        "params",
        "validators",
        "client",
        "config",
    ] {
        assert!(
            manifest
                .get(format!("sample_service/lib/sample_service/{}.rb", stem))
                .is_some(),
            "missing {}.rb",
            stem
        );
    }
    assert!(manifest.get("sample_service/lib/sample_service.rb").is_some());
    assert!(manifest.get("sample_service/sample_service.gemspec").is_some());
}

#[test]
fn builder_binds_method_and_label() {
    let manifest = generate();
    let builders = file(&manifest, "builders");
    assert!(builders.contains("http_req.http_method = 'GET'"));
    assert!(builders.contains("'/things/%<id>s',"));
    assert!(builders.contains("id: Harbor::HTTP.uri_escape(input[:id].to_s)"));
    assert!(builders.contains(
        "raise Harbor::HTTP::LabelBindingError, 'label :id cannot be nil or empty' if input[:id].to_s.empty?"
    ));
}

#[test]
fn builder_handles_query_list_and_prefix_headers() {
    let manifest = generate();
    let builders = file(&manifest, "builders");
    // list query values append one k=v pair per element
    assert!(builders.contains("input[:items].each do |value|"));
    assert!(builders.contains("http_req.append_query_param('x', value.to_s) unless value.nil?"));
    // query timestamps default to date-time
    assert!(builders
        .contains("http_req.append_query_param('since', Harbor::TimeHelper.to_date_time(input[:since])) unless input[:since].nil?"));
    // prefix headers iterate the map
    assert!(builders.contains("input[:tags].each do |key, value|"));
    assert!(builders.contains("http_req.headers[\"X-Tag-#{key}\"] = value unless value.nil? || value.empty?"));
    // static query strings are appended up front
    assert!(builders.contains("CGI.parse('sort=asc').each do |k, v|"));
}

#[test]
fn builder_handles_greedy_labels_and_media_type_headers() {
    let manifest = generate();
    let builders = file(&manifest, "builders");
    assert!(builders.contains(
        "path: (input[:path].to_s).split('/').map { |s| Harbor::HTTP.uri_escape(s) }.join('/')"
    ));
    assert!(builders.contains(
        "http_req.headers['X-J'] = Base64::encode64(input[:meta]).strip unless input[:meta].nil? || input[:meta].empty?"
    ));
    // unbound members serialize into the JSON body
    assert!(builders.contains("data['data'] = input[:data] unless input[:data].nil?"));
    assert!(builders.contains("http_req.body = StringIO.new(Harbor::JSON.dump(data))"));
}

#[test]
fn parser_reads_headers_body_and_errors() {
    let manifest = generate();
    let parsers = file(&manifest, "parsers");
    assert!(parsers.contains("data = Types::GetThingOutput.new"));
    assert!(parsers.contains("data.tag = http_resp.headers['X-Tag']"));
    assert!(parsers
        .contains("data.created = Time.parse(http_resp.headers['X-Created']) if http_resp.headers['X-Created']"));
    assert!(parsers.contains("map = Harbor::JSON.load(http_resp.body)"));
    assert!(parsers.contains("data.name = map['name']"));
    // error shapes get http_resp parsers
    assert!(parsers.contains("# Error Parser for InvalidGreeting"));
    assert!(parsers.contains("data.message = map['message']"));
    // prefix headers are collected into a map
    assert!(parsers.contains("data.tags[key.delete_prefix('X-Tag-')] = value if key.start_with?('X-Tag-')"));
}

#[test]
fn parser_preserves_nulls_only_for_sparse_lists() {
    let manifest = generate();
    let parsers = file(&manifest, "parsers");
    assert!(parsers.contains("data << (value.nil? ? nil : value)"));
    // the non-sparse IntegerList appears only on the builder side; check a
    // non-sparse structure list is absent from sparse handling
    assert!(!parsers.contains("data << (value.nil? ? nil : Parsers::IntegerList"));
}

#[test]
fn stubs_short_circuit_recursive_shapes() {
    let manifest = generate();
    let stubs = file(&manifest, "stubs");
    assert!(stubs.contains("return nil if visited.include?('Tree')"));
    assert!(stubs.contains("visited = visited + ['Tree']"));
    assert!(stubs.contains("child: Stubs::Tree.default(visited),"));
    assert!(stubs.contains("http_resp.status = 200"));
}

#[test]
fn errors_inherit_by_fault_and_resolve_codes() {
    let manifest = generate();
    let errors = file(&manifest, "errors");
    assert!(errors.contains("class ApiError < Harbor::HTTP::ApiError; end"));
    assert!(errors.contains("class InvalidGreeting < ApiClientError"));
    assert!(errors.contains("@data = Parsers::InvalidGreeting.parse(http_resp)"));
    assert!(errors.contains("def self.error_code(http_resp)"));
    assert!(errors.contains("map['__type'].to_s.split('#').last"));
}

#[test]
fn types_cover_structs_unions_and_enums() {
    let manifest = generate();
    let types = file(&manifest, "types");
    assert!(types.contains("GetThingInput = ::Struct.new("));
    assert!(types.contains("keyword_init: true"));
    assert!(types.contains("class Choice < Harbor::Union"));
    assert!(types.contains("class Unknown < Choice"));
    assert!(types.contains("module ThingStatus"));
    assert!(types.contains("AVAILABLE = 'AVAILABLE'"));
    assert!(types.contains("PENDING = 'PENDING'"));
}

#[test]
fn client_wires_the_middleware_stack_in_step_order() {
    let manifest = generate();
    let client = file(&manifest, "client");
    let get_thing = client
        .split("def get_thing")
        .nth(1)
        .expect("get_thing method");
    let get_thing = get_thing.split("def ").next().unwrap();
    let validate = get_thing.find("Harbor::Middleware::Validate").unwrap();
    let build = get_thing.find("Harbor::Middleware::Build").unwrap();
    let content_length = get_thing
        .find("Harbor::HTTP::Middleware::ContentLength")
        .unwrap();
    let parse = get_thing.find("Harbor::Middleware::Parse").unwrap();
    assert!(validate < build && build < content_length && content_length < parse);
    assert!(get_thing.contains("validator: Validators::GetThingInput"));
    assert!(get_thing.contains("data_parser: Parsers::GetThing"));
    assert!(get_thing.contains("errors: [Errors::InvalidGreeting]"));
    assert!(get_thing.contains("success_status_code: 200"));
    assert!(get_thing.contains("raise resp.error if resp.error"));
    // operations are sorted by name
    let order: Vec<usize> = ["def get_thing", "def get_tree", "def list_things", "def ping", "def put_file"]
        .iter()
        .map(|m| client.find(m).unwrap_or_else(|| panic!("missing {}", m)))
        .collect();
    assert!(order.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn user_middleware_obeys_order_and_predicates() {
    let dir = tempfile::tempdir().unwrap();
    let model = load_model(dir.path());
    let mut generator = Generator::new();
    generator.add_middleware(
        Middleware::builder("Sample::Middleware::First")
            .step(MiddlewareStackStep::Build)
            .order(-5)
            .build()
            .unwrap(),
    );
    generator.add_middleware(
        Middleware::builder("Sample::Middleware::Second")
            .step(MiddlewareStackStep::Build)
            .order(10)
            .operation_predicate(|_, _, operation| {
                operation.shape_name().to_string() != "Ping"
            })
            .build()
            .unwrap(),
    );
    let manifest = generator.generate(&model, &settings()).unwrap();
    let client = file(&manifest, "client");

    let get_thing = client.split("def get_thing").nth(1).unwrap();
    let get_thing = get_thing.split("def ").next().unwrap();
    let first = get_thing.find("Sample::Middleware::First").unwrap();
    let second = get_thing.find("Sample::Middleware::Second").unwrap();
    assert!(first < second);

    let ping = client.split("def ping").nth(1).unwrap();
    let ping = ping.split("def ").next().unwrap();
    assert!(ping.contains("Sample::Middleware::First"));
    assert!(!ping.contains("Sample::Middleware::Second"));
}

#[test]
fn config_enumerates_contributed_keys() {
    let manifest = generate();
    let config = file(&manifest, "config");
    assert!(config.contains("@endpoint = options[:endpoint]"));
    assert!(config.contains("@http_wire_trace = options.fetch(:http_wire_trace, false)"));
    assert!(config.contains("@logger = options.fetch(:logger, Logger.new($stdout, level: @log_level))"));
    assert!(config.contains("@validate_input = options.fetch(:validate_input, true)"));
    assert!(config.contains("attr_accessor :endpoint"));
}

#[test]
fn validators_and_params_cover_the_input_closure() {
    let manifest = generate();
    let validators = file(&manifest, "validators");
    assert!(validators.contains("class GetThingInput"));
    assert!(validators
        .contains("Harbor::Validator.validate_required!(input[:id], context: \"#{context}[:id]\")"));
    assert!(validators
        .contains("Harbor::Validator.validate_types!(input[:id], ::String, context: \"#{context}[:id]\")"));
    assert!(validators.contains("Choice.validate!(input[:choice], context: \"#{context}[:choice]\") unless input[:choice].nil?"));

    let params = file(&manifest, "params");
    assert!(params.contains("module GetThingInput"));
    assert!(params.contains("type = Types::GetThingInput.new"));
    assert!(params.contains("type.id = params[:id]"));
    assert!(params
        .contains("type.choice = Choice.build(params[:choice], context: \"#{context}[:choice]\") unless params[:choice].nil?"));
}

#[test]
fn entrypoint_requires_every_file() {
    let manifest = generate();
    let entry = manifest
        .get("sample_service/lib/sample_service.rb")
        .expect("entrypoint");
    let entry = String::from_utf8(entry.to_vec()).unwrap();
    assert!(entry.contains("require 'harbor'"));
    for stem in ["types", "errors", "params", "validators", "builders", "parsers", "stubs", "config", "client"] {
        assert!(
            entry.contains(&format!("require_relative 'sample_service/{}'", stem)),
            "entrypoint missing {}",
            stem
        );
    }
    assert!(entry.contains("module SampleService"));
    assert!(entry.contains("VERSION = '1.0.0'"));
}

#[test]
fn generation_is_deterministic() {
    let first = generate();
    let second = generate();
    let a: Vec<_> = first.iter().collect();
    let b: Vec<_> = second.iter().collect();
    assert_eq!(a.len(), b.len());
    for ((path_a, content_a), (path_b, content_b)) in a.iter().zip(b.iter()) {
        assert_eq!(path_a, path_b);
        assert_eq!(content_a, content_b, "content differs for {}", path_a.display());
    }
}

#[test]
fn unknown_protocol_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let stripped = SAMPLE_MODEL.replace("\"harbor.protocols#restJson\": {},", "");
    let model_path = dir.path().join("sample.json");
    std::fs::write(&model_path, stripped).unwrap();
    let model = sources_to_model(&[ModelSource::from_file(model_path)], dir.path()).unwrap();
    let err = Generator::new().generate(&model, &settings()).unwrap_err();
    assert!(matches!(err, harbor_codegen::Error::UnsupportedProtocol(_)));
}
