use tracing::{debug, error, warn};

use crate::cgroup::CGroupLimits;
use crate::descriptor::Descriptor;
use crate::environment::Environment;

const MEMORY_ARGUMENTS: &[&str] = &["-Xmx", "-XX:+UseCGroupMemoryLimitForHeap", "-Xms"];
const METASPACE_ARGUMENTS: &[&str] = &["-XX:MaxMetaspaceSize"];
const CPU_CORE_ARGUMENTS: &[&str] = &[
    "-XX:ParallelGCThreads",
    "-XX:ConcGCThreads",
    "-Djava.util.concurrent.ForkJoinPool.common.parallelism",
];
const HEAP_DUMP_PATH_ARGUMENTS: &[&str] = &["-XX:HeapDumpPath"];
const HEAP_DUMP_ON_OOM_ARGUMENTS: &[&str] = &["-XX:+HeapDumpOnOutOfMemoryError"];

const DEFAULT_HEAP_FRACTION: i64 = 4;
// Roughly 15% of the limit.
const DEFAULT_METASPACE_FRACTION: i64 = 7;
const DEFAULT_MAX_RAM_PERCENTAGE: f64 = 75.0;
const DEFAULT_DEBUG_PORT: u16 = 5005;
const DEFAULT_HEAP_DUMP_PATH: &str = "/tmp";

/// Working state threaded through the modificators of one launch.
pub struct ArgumentsContext<'a> {
    pub arguments: Vec<String>,
    pub environment: &'a dyn Environment,
    pub descriptor: &'a Descriptor,
    pub limits: CGroupLimits,
}

/// A predicate-guarded rewrite of the JVM argument list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modificator {
    DescriptorJavaOptions,
    EnvironmentJavaOptions,
    ExitOnOom,
    RemoteDebug,
    Diagnostics,
    Java11PlusDiagnostics,
    Jolokia,
    AppDynamics,
    OpenTelemetry,
    CpuCoreTuning,
    Java8Memory,
    Java11PlusMemory,
    Metaspace,
    HeapDump,
}

pub const JAVA8_MODIFICATORS: &[Modificator] = &[
    Modificator::DescriptorJavaOptions,
    Modificator::EnvironmentJavaOptions,
    Modificator::ExitOnOom,
    Modificator::RemoteDebug,
    Modificator::Diagnostics,
    Modificator::Jolokia,
    Modificator::AppDynamics,
    Modificator::OpenTelemetry,
    Modificator::CpuCoreTuning,
    Modificator::Java8Memory,
    Modificator::Metaspace,
    Modificator::HeapDump,
];

pub const JAVA11_MODIFICATORS: &[Modificator] = &[
    Modificator::DescriptorJavaOptions,
    Modificator::EnvironmentJavaOptions,
    Modificator::ExitOnOom,
    Modificator::RemoteDebug,
    Modificator::Java11PlusDiagnostics,
    Modificator::Jolokia,
    Modificator::AppDynamics,
    Modificator::OpenTelemetry,
    Modificator::Java11PlusMemory,
    Modificator::HeapDump,
];

impl Modificator {
    pub fn name(self) -> &'static str {
        match self {
            Modificator::DescriptorJavaOptions => "descriptor-java-options",
            Modificator::EnvironmentJavaOptions => "environment-java-options",
            Modificator::ExitOnOom => "exit-on-oom",
            Modificator::RemoteDebug => "remote-debug",
            Modificator::Diagnostics => "diagnostics",
            Modificator::Java11PlusDiagnostics => "java11-diagnostics",
            Modificator::Jolokia => "jolokia",
            Modificator::AppDynamics => "appdynamics",
            Modificator::OpenTelemetry => "opentelemetry",
            Modificator::CpuCoreTuning => "cpu-core-tuning",
            Modificator::Java8Memory => "java8-memory",
            Modificator::Java11PlusMemory => "java11-memory",
            Modificator::Metaspace => "metaspace",
            Modificator::HeapDump => "heap-dump",
        }
    }

    pub fn applies(self, ctx: &ArgumentsContext<'_>) -> bool {
        let env = ctx.environment;
        match self {
            Modificator::DescriptorJavaOptions => {
                !ctx.descriptor.data.java_options.trim().is_empty()
            }
            Modificator::EnvironmentJavaOptions => env.lookup("JAVA_OPTIONS").is_some(),
            Modificator::ExitOnOom => env
                .lookup("ENABLE_EXIT_ON_OOM")
                .is_some_and(|value| !value.is_empty()),
            Modificator::RemoteDebug => env.is_enabled("ENABLE_REMOTE_DEBUG"),
            Modificator::Diagnostics | Modificator::Java11PlusDiagnostics => {
                env.is_enabled("ENABLE_JAVA_DIAGNOSTICS")
            }
            Modificator::Jolokia => env.is_enabled("ENABLE_JOLOKIA"),
            Modificator::AppDynamics => env.is_enabled("ENABLE_APPDYNAMICS"),
            Modificator::OpenTelemetry => env.is_enabled("ENABLE_OTEL_TRACE"),
            Modificator::CpuCoreTuning => {
                ctx.limits.has_core_limit() && !contains_argument(&ctx.arguments, CPU_CORE_ARGUMENTS)
            }
            Modificator::Java8Memory | Modificator::Java11PlusMemory => {
                ctx.limits.has_memory_limit()
                    && !contains_argument(&ctx.arguments, MEMORY_ARGUMENTS)
            }
            Modificator::Metaspace => {
                ctx.limits.has_memory_limit()
                    && env.lookup("JAVA_MAX_METASPACE_RATIO").is_some()
                    && !contains_argument(&ctx.arguments, METASPACE_ARGUMENTS)
            }
            Modificator::HeapDump => {
                !(contains_argument(&ctx.arguments, HEAP_DUMP_PATH_ARGUMENTS)
                    && contains_argument(&ctx.arguments, HEAP_DUMP_ON_OOM_ARGUMENTS))
            }
        }
    }

    pub fn apply(self, ctx: &ArgumentsContext<'_>) -> Vec<String> {
        match self {
            Modificator::DescriptorJavaOptions => append(
                &ctx.arguments,
                split_options("descriptor JavaOptions", &ctx.descriptor.data.java_options),
            ),
            Modificator::EnvironmentJavaOptions => {
                let options = ctx.environment.lookup("JAVA_OPTIONS").unwrap_or_default();
                append(&ctx.arguments, split_options("JAVA_OPTIONS", &options))
            }
            Modificator::ExitOnOom => prepend(
                vec!["-XX:+ExitOnOutOfMemoryError".to_string()],
                &ctx.arguments,
            ),
            Modificator::RemoteDebug => remote_debug(ctx),
            Modificator::Diagnostics => prepend(
                strings(&[
                    "-XX:NativeMemoryTracking=summary",
                    "-XX:+PrintGC",
                    "-XX:+PrintGCDateStamps",
                    "-XX:+PrintGCTimeStamps",
                    "-XX:+UnlockDiagnosticVMOptions",
                ]),
                &ctx.arguments,
            ),
            Modificator::Java11PlusDiagnostics => prepend(
                strings(&[
                    "-XX:NativeMemoryTracking=summary",
                    "-Xlog:gc",
                    "-XX:+UnlockDiagnosticVMOptions",
                ]),
                &ctx.arguments,
            ),
            Modificator::Jolokia => jolokia(ctx),
            Modificator::AppDynamics => app_dynamics(ctx),
            Modificator::OpenTelemetry => open_telemetry(ctx),
            Modificator::CpuCoreTuning => {
                let cores = ctx.limits.max_cores_estimated;
                prepend(
                    vec![
                        format!("-Djava.util.concurrent.ForkJoinPool.common.parallelism={cores}"),
                        format!("-XX:ConcGCThreads={cores}"),
                        format!("-XX:ParallelGCThreads={cores}"),
                    ],
                    &ctx.arguments,
                )
            }
            Modificator::Java8Memory => {
                let fraction =
                    ratio_fraction(ctx.environment, "JAVA_MAX_MEM_RATIO", DEFAULT_HEAP_FRACTION);
                let heap_mb = ctx.limits.memory_fraction_in_mb(fraction);
                prepend(
                    vec![format!("-Xms{heap_mb}m"), format!("-Xmx{heap_mb}m")],
                    &ctx.arguments,
                )
            }
            Modificator::Java11PlusMemory => {
                let percent = max_ram_percentage(ctx.environment);
                prepend(
                    vec![format!("-XX:MaxRAMPercentage={percent:.1}")],
                    &ctx.arguments,
                )
            }
            Modificator::Metaspace => {
                let fraction = ratio_fraction(
                    ctx.environment,
                    "JAVA_MAX_METASPACE_RATIO",
                    DEFAULT_METASPACE_FRACTION,
                );
                let metaspace_mb = ctx.limits.memory_fraction_in_mb(fraction);
                prepend(
                    vec![format!("-XX:MaxMetaspaceSize={metaspace_mb}m")],
                    &ctx.arguments,
                )
            }
            Modificator::HeapDump => heap_dump(ctx),
        }
    }
}

/// Runs each modificator once, in order, and returns the final list.
pub fn apply_modificators(modificators: &[Modificator], mut ctx: ArgumentsContext<'_>) -> Vec<String> {
    for modificator in modificators {
        if !modificator.applies(&ctx) {
            continue;
        }
        debug!(
            "arguments before {} are {:?}",
            modificator.name(),
            ctx.arguments
        );
        ctx.arguments = modificator.apply(&ctx);
        debug!(
            "arguments after {} are {:?}",
            modificator.name(),
            ctx.arguments
        );
    }
    ctx.arguments
}

/// Tokenises a shell-quoted option string; an unparsable string is kept whole.
pub fn split_options(label: &str, options: &str) -> Vec<String> {
    match shell_words::split(options) {
        Ok(tokens) => tokens,
        Err(err) => {
            warn!("unable to parse {label} {options:?}: {err}; passing it through unchanged");
            vec![options.to_string()]
        }
    }
}

pub fn contains_argument(arguments: &[String], prefixes: &[&str]) -> bool {
    arguments
        .iter()
        .any(|arg| prefixes.iter().any(|prefix| arg.starts_with(prefix)))
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn prepend(mut flags: Vec<String>, arguments: &[String]) -> Vec<String> {
    flags.extend_from_slice(arguments);
    flags
}

fn append(arguments: &[String], extra: Vec<String>) -> Vec<String> {
    let mut combined = arguments.to_vec();
    combined.extend(extra);
    combined
}

fn ratio_fraction(env: &dyn Environment, key: &str, default: i64) -> i64 {
    let Some(value) = env.lookup(key) else {
        return default;
    };
    match value.trim().parse::<i64>() {
        Ok(percent) if (1..=100).contains(&percent) => 100 / percent,
        Ok(percent) => {
            warn!("{key}={percent} is outside 1..=100; using fraction {default}");
            default
        }
        Err(err) => {
            warn!("could not parse {key}={value:?}: {err}; using fraction {default}");
            default
        }
    }
}

fn max_ram_percentage(env: &dyn Environment) -> f64 {
    let Some(value) = env.lookup("JAVA_MAX_RAM_PERCENTAGE") else {
        return DEFAULT_MAX_RAM_PERCENTAGE;
    };
    match value.trim().parse::<f64>() {
        Ok(percent) if percent.is_finite() && percent > 0.0 && percent <= 100.0 => percent,
        _ => {
            warn!(
                "could not use JAVA_MAX_RAM_PERCENTAGE={value:?}; defaulting to {DEFAULT_MAX_RAM_PERCENTAGE} percent"
            );
            DEFAULT_MAX_RAM_PERCENTAGE
        }
    }
}

fn remote_debug(ctx: &ArgumentsContext<'_>) -> Vec<String> {
    let port = ctx
        .environment
        .lookup("DEBUG_PORT")
        .and_then(|value| value.trim().parse::<u16>().ok())
        .unwrap_or(DEFAULT_DEBUG_PORT);
    prepend(
        vec![format!(
            "-agentlib:jdwp=transport=dt_socket,server=y,suspend=n,address={port}"
        )],
        &ctx.arguments,
    )
}

fn jolokia(ctx: &ArgumentsContext<'_>) -> Vec<String> {
    let Some(jolokia_path) = ctx.environment.lookup("JOLOKIA_PATH") else {
        warn!("Jolokia was supposed to be enabled, but JOLOKIA_PATH is not set");
        return ctx.arguments.clone();
    };
    prepend(
        vec![format!(
            "-javaagent:{jolokia_path}=host=0.0.0.0,port=8778,protocol=https"
        )],
        &ctx.arguments,
    )
}

fn open_telemetry(ctx: &ArgumentsContext<'_>) -> Vec<String> {
    let env = ctx.environment;
    let Some(base_dir) = env.lookup("OPENTELEMETRY_AGENT_BASE_DIR") else {
        error!("OpenTelemetry was supposed to be enabled, but OPENTELEMETRY_AGENT_BASE_DIR is not set");
        return ctx.arguments.clone();
    };

    let mut attributes = Vec::with_capacity(3);
    for key in ["APP_NAME", "POD_NAMESPACE", "OPENSHIFT_CLUSTER"] {
        match env.lookup(key) {
            Some(value) => attributes.push(value),
            None => {
                error!("required value {key} not found; OpenTelemetry agent is disabled");
                return ctx.arguments.clone();
            }
        }
    }

    prepend(
        vec![
            format!("-javaagent:{base_dir}/opentelemetry-javaagent.jar"),
            format!(
                "-Dotel.resource.attributes=service.name={},service.namespace={},service.cluster={}",
                attributes[0], attributes[1], attributes[2]
            ),
        ],
        &ctx.arguments,
    )
}

fn app_dynamics(ctx: &ArgumentsContext<'_>) -> Vec<String> {
    let env = ctx.environment;
    let Some(base_dir) = env.lookup("APPDYNAMICS_AGENT_BASE_DIR") else {
        error!("AppDynamics was supposed to be enabled, but APPDYNAMICS_AGENT_BASE_DIR is not set");
        return ctx.arguments.clone();
    };

    let Some(mut application_name) = env
        .lookup("APPDYNAMICS_AGENT_APPLICATION_NAME")
        .or_else(|| env.lookup("POD_NAMESPACE"))
    else {
        error!("AppDynamics has no application name; agent will not be enabled");
        return ctx.arguments.clone();
    };
    // Controllers are shared between clusters, so the cluster keeps names unique.
    if let Some(cluster) = env.lookup("OPENSHIFT_CLUSTER") {
        if !env.is_disabled("APPDYNAMICS_ENABLE_CLUSTER_SUFFIX") {
            application_name = format!("{application_name}-{cluster}");
        }
    }

    let Some(tier_name) = env
        .lookup("APPDYNAMICS_AGENT_TIER_NAME")
        .or_else(|| env.lookup("APP_NAME"))
        .or_else(|| env.lookup("SERVICE_NAME"))
    else {
        error!("AppDynamics has no tier name; agent will not be enabled");
        return ctx.arguments.clone();
    };

    let Some(node_name) = env
        .lookup("APPDYNAMICS_AGENT_NODE_NAME")
        .or_else(|| env.lookup("POD_NAME"))
        .or_else(|| env.lookup("HOSTNAME"))
    else {
        error!("AppDynamics has no node name; agent will not be enabled");
        return ctx.arguments.clone();
    };

    let mark_as_historical = env
        .lookup("APPDYNAMICS_JVM_SHUTDOWN_MARK_NODE_AS_HISTORICAL")
        .unwrap_or_else(|| "true".to_string());

    let mut flags = vec![
        format!("-javaagent:{base_dir}/javaagent.jar"),
        format!("-Dappdynamics.agent.applicationName={application_name}"),
        format!("-Dappdynamics.agent.tierName={tier_name}"),
        format!("-Dappdynamics.agent.nodeName={node_name}"),
        format!("-Dappdynamics.agent.uniqueHostId={node_name}"),
        format!("-Dappdynamics.jvm.shutdown.mark.node.as.historical={mark_as_historical}"),
    ];
    if let Some(url) = env.lookup("APPDYNAMICS_ANALYTICS_AGENT_URL") {
        flags.push(format!("-Dappdynamics.analytics.agent.url={url}"));
    }
    if let Some(home) = env.lookup("HOME") {
        flags.push(format!("-Dappdynamics.agent.logs.dir={home}/logs/appdynamics"));
    }

    prepend(flags, &ctx.arguments)
}

fn heap_dump(ctx: &ArgumentsContext<'_>) -> Vec<String> {
    let env = ctx.environment;
    let mut flags = Vec::with_capacity(2);

    if !contains_argument(&ctx.arguments, HEAP_DUMP_PATH_ARGUMENTS) {
        let path = env
            .lookup("JAVA_HEAP_DUMP_PATH")
            .unwrap_or_else(|| DEFAULT_HEAP_DUMP_PATH.to_string());
        flags.push(format!("-XX:HeapDumpPath={path}"));
    }

    if !contains_argument(&ctx.arguments, HEAP_DUMP_ON_OOM_ARGUMENTS)
        && !env.is_disabled("JAVA_HEAP_DUMP_ON_OUT_OF_MEMORY_ERROR")
    {
        flags.push("-XX:+HeapDumpOnOutOfMemoryError".to_string());
    }

    prepend(flags, &ctx.arguments)
}
