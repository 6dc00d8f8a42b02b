pub mod classpath;
pub mod options;

use tracing::{debug, warn};

use crate::cgroup::CGroupLimits;
use crate::descriptor::Descriptor;
use crate::environment::{expand_variables, Environment};
use crate::errors::RadishError;

use self::classpath::create_classpath;
use self::options::{
    apply_modificators, split_options, ArgumentsContext, Modificator, JAVA11_MODIFICATORS,
    JAVA8_MODIFICATORS,
};

pub const JAVA_VERSION_ENV: &str = "JAVA_VERSION_MAJOR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JavaVersion {
    Java8,
    Java11,
    Java17,
    Java21,
}

impl JavaVersion {
    pub fn from_env(env: &dyn Environment) -> Result<Self, RadishError> {
        let value = env.lookup(JAVA_VERSION_ENV).unwrap_or_default();
        match value.trim() {
            "8" => Ok(Self::Java8),
            "11" => Ok(Self::Java11),
            "17" => Ok(Self::Java17),
            "21" => Ok(Self::Java21),
            _ => Err(RadishError::UnsupportedJavaVersion(value)),
        }
    }

    pub fn modificators(self) -> &'static [Modificator] {
        match self {
            Self::Java8 => JAVA8_MODIFICATORS,
            Self::Java11 | Self::Java17 | Self::Java21 => JAVA11_MODIFICATORS,
        }
    }
}

pub fn build_classpath(descriptor: &Descriptor) -> String {
    create_classpath(
        &descriptor.data.basedir,
        &descriptor.data.paths_to_class_libraries,
    )
    .join(":")
}

/// Produces the complete JVM argument line: classpath, derived flags, main
/// class and application arguments, with environment references expanded.
pub fn build_arguments(
    descriptor: &Descriptor,
    env: &dyn Environment,
    modificators: &[Modificator],
    limits: CGroupLimits,
) -> Vec<String> {
    let classpath = build_classpath(descriptor);
    let seed = if classpath.is_empty() {
        warn!("classpath is empty; starting without -cp");
        Vec::new()
    } else {
        vec!["-cp".to_string(), classpath]
    };

    let mut arguments = apply_modificators(
        modificators,
        ArgumentsContext {
            arguments: seed,
            environment: env,
            descriptor,
            limits,
        },
    );

    let main_class = descriptor.data.main_class.trim();
    if !main_class.is_empty() {
        arguments.push(main_class.to_string());
    }
    if !descriptor.data.application_args.trim().is_empty() {
        arguments.extend(split_options(
            "ApplicationArgs",
            &descriptor.data.application_args,
        ));
    }

    let arguments: Vec<String> = arguments
        .into_iter()
        .map(|argument| match expand_variables(&argument, env) {
            Some(expanded) => expanded,
            None => {
                warn!("unterminated variable reference in {argument:?}; leaving it unchanged");
                argument
            }
        })
        .collect();
    debug!("final java arguments are {arguments:?}");
    arguments
}
