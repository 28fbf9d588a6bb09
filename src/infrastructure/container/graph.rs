//! 服务图校验：悬空引用与循环依赖

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use super::definition::ServiceDefinition;
use super::error::{ContainerError, ReferenceKind};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// 校验服务图，返回依赖优先的构造顺序
pub(crate) fn validate(
    definitions: &BTreeMap<String, ServiceDefinition>,
    parameters: &BTreeMap<String, Value>,
) -> Result<Vec<String>, ContainerError> {
    check_references(definitions, parameters)?;

    let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(definitions.len());
    let mut order = Vec::with_capacity(definitions.len());

    for id in definitions.keys() {
        visit(id, definitions, &mut marks, &mut order)?;
    }

    Ok(order)
}

fn check_references(
    definitions: &BTreeMap<String, ServiceDefinition>,
    parameters: &BTreeMap<String, Value>,
) -> Result<(), ContainerError> {
    for (id, definition) in definitions {
        for argument in definition.arguments() {
            let Some((kind, target)) = argument.reference() else {
                continue;
            };
            let found = match kind {
                ReferenceKind::Service => definitions.contains_key(target),
                ReferenceKind::Parameter => parameters.contains_key(target),
            };
            if !found {
                return Err(ContainerError::UnresolvedReference {
                    service: id.clone(),
                    reference: target.to_string(),
                    kind,
                });
            }
        }
    }
    Ok(())
}

/// 深度优先遍历中的一帧：服务ID、它引用的服务、下一个待访问的下标
struct Frame<'a> {
    id: &'a str,
    dependencies: Vec<&'a str>,
    next: usize,
}

/// 显式栈实现的深度优先遍历，依赖链再深也不会耗尽线程栈
fn visit<'a>(
    root: &'a str,
    definitions: &'a BTreeMap<String, ServiceDefinition>,
    marks: &mut HashMap<&'a str, Mark>,
    order: &mut Vec<String>,
) -> Result<(), ContainerError> {
    if marks.contains_key(root) {
        return Ok(());
    }

    let mut stack = vec![enter(root, definitions, marks)?];
    while let Some(frame) = stack.last_mut() {
        let Some(&dependency) = frame.dependencies.get(frame.next) else {
            let id = frame.id;
            stack.pop();
            marks.insert(id, Mark::Done);
            order.push(id.to_string());
            continue;
        };
        frame.next += 1;

        match marks.get(dependency) {
            Some(Mark::Done) => {}
            Some(Mark::Visiting) => {
                // 栈上的帧就是当前路径，其中一定包含 dependency
                let start = stack.iter().position(|f| f.id == dependency).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..].iter().map(|f| f.id.to_string()).collect();
                cycle.push(dependency.to_string());
                return Err(ContainerError::CyclicDependency { cycle });
            }
            None => {
                let next = enter(dependency, definitions, marks)?;
                stack.push(next);
            }
        }
    }

    Ok(())
}

fn enter<'a>(
    id: &'a str,
    definitions: &'a BTreeMap<String, ServiceDefinition>,
    marks: &mut HashMap<&'a str, Mark>,
) -> Result<Frame<'a>, ContainerError> {
    let (key, definition) = definitions
        .get_key_value(id)
        .ok_or_else(|| ContainerError::UnknownService { id: id.to_string() })?;
    marks.insert(key.as_str(), Mark::Visiting);
    Ok(Frame {
        id: key.as_str(),
        dependencies: definition.service_references().collect(),
        next: 0,
    })
}
