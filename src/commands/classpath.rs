use std::path::Path;

use anyhow::Result;

use crate::environment::ProcessEnvironment;
use crate::java::build_classpath;

use super::load_descriptor;

pub(crate) fn run(descriptor: Option<&Path>) -> Result<i32> {
    let descriptor = load_descriptor(descriptor, &ProcessEnvironment)?;
    println!("{}", build_classpath(&descriptor));
    Ok(0)
}
