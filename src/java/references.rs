//! Reference search over the index: which call sites bind to a given method.

use tracing::debug;

use crate::error::ProviderError;
use crate::finder::{Accuracy, CancellationToken, MethodRef, ReferenceMatch, ReferenceProvider, SourceLocation};

use super::SourceIndex;
use super::types::{CallKind, CallSiteEntry, MethodDef, Receiver};

impl ReferenceProvider for SourceIndex {
    fn search(&self, method: &MethodRef, cancel: &CancellationToken) -> Result<Vec<ReferenceMatch>, ProviderError> {
        let Some(&target_id) = self.lookups.method_by_ref.get(method) else {
            return Err(ProviderError::Query(format!("{} is not in the index", method)));
        };
        let target = &self.methods[target_id as usize];

        let keys: Vec<&str> = if method.is_constructor() {
            vec![method.simple_type_name(), "super", "this", "new"]
        } else {
            vec![method.name()]
        };
        let mut sites: Vec<(u32, u32)> = keys.iter()
            .filter_map(|k| self.lookups.calls_by_name.get(*k))
            .flatten()
            .copied()
            .collect();
        sites.sort_by_key(|&(m, c)| {
            let def = &self.methods[m as usize];
            (def.file_id, def.calls[c as usize].offset)
        });
        sites.dedup();

        let mut matches = Vec::new();
        let mut current_file = None;
        for (method_id, call_idx) in sites {
            let caller = &self.methods[method_id as usize];
            if current_file != Some(caller.file_id) {
                if cancel.is_cancelled() {
                    debug!(method = %method, "Reference search cancelled");
                    return Ok(matches);
                }
                current_file = Some(caller.file_id);
            }
            let call = &caller.calls[call_idx as usize];
            if let Some(n) = call.arg_count
                && !method.accepts_arity(n)
            {
                continue;
            }
            let accuracy = if method.is_constructor() {
                self.bind_constructor(caller, call, target_id, target)
            } else {
                self.bind_method(caller, call, target_id)
            };
            if let Some(accuracy) = accuracy {
                matches.push(ReferenceMatch {
                    location: SourceLocation {
                        file: self.files[caller.file_id as usize].path.clone(),
                        offset: call.offset,
                        length: call.length,
                    },
                    accuracy,
                    element: Some(caller.method.clone()),
                });
            }
        }
        Ok(matches)
    }
}

/// Exact when the target is the only candidate, potential when it is one of several.
fn classify(candidates: &[u32], target_id: u32) -> Option<Accuracy> {
    match candidates {
        [only] if *only == target_id => Some(Accuracy::Exact),
        _ if candidates.contains(&target_id) => Some(Accuracy::Potential),
        _ => None,
    }
}

impl SourceIndex {
    fn bind_method(&self, caller: &MethodDef, call: &CallSiteEntry, target_id: u32) -> Option<Accuracy> {
        if !matches!(call.kind, CallKind::Method | CallKind::MethodReference) {
            return None;
        }
        let name = call.name.as_str();
        let arity = call.arg_count;
        let candidates = match &call.receiver {
            Receiver::Implicit => self.bind_implicit(caller, name, arity),
            Receiver::Super => {
                let superclass = self.superclass(caller.type_id)?;
                self.lookup_in_hierarchy(&[superclass], name, arity)
            }
            Receiver::Type(ty) => {
                // Receivers of library types never bind to indexed methods.
                let type_id = self.resolve_type(ty, caller.file_id, Some(caller.type_id))?;
                self.lookup_in_hierarchy(&[type_id], name, arity)
            }
            Receiver::Unknown => self.lookups.methods_by_name
                .get(name)
                .map(|ids| {
                    ids.iter()
                        .copied()
                        .filter(|&id| arity.is_none_or(|n| self.methods[id as usize].method.accepts_arity(n)))
                        .collect::<Vec<u32>>()
                })
                .unwrap_or_default(),
        };
        classify(&candidates, target_id)
    }

    /// Unqualified calls: the enclosing type and its outer types, then static imports.
    fn bind_implicit(&self, caller: &MethodDef, name: &str, arity: Option<usize>) -> Vec<u32> {
        let mut scope = Some(caller.type_id);
        while let Some(type_id) = scope {
            let found = self.lookup_in_hierarchy(&[type_id], name, arity);
            if !found.is_empty() {
                return found;
            }
            scope = self.types[type_id as usize].outer;
        }
        let file = &self.files[caller.file_id as usize];
        for (ty, member) in &file.static_imports {
            if member != name {
                continue;
            }
            if let Some(type_id) = self.resolve_type(ty, caller.file_id, None) {
                let found = self.lookup_in_hierarchy(&[type_id], name, arity);
                if !found.is_empty() {
                    return found;
                }
            }
        }
        Vec::new()
    }

    fn bind_constructor(&self, caller: &MethodDef, call: &CallSiteEntry, target_id: u32, target: &MethodDef) -> Option<Accuracy> {
        let created = match (call.kind, &call.receiver) {
            (CallKind::New, Receiver::Type(ty)) => self.resolve_type(ty, caller.file_id, Some(caller.type_id))?,
            (CallKind::MethodReference, Receiver::Type(ty)) if call.name == "new" => {
                self.resolve_type(ty, caller.file_id, Some(caller.type_id))?
            }
            (CallKind::ThisConstructor, _) => caller.type_id,
            (CallKind::SuperConstructor, _) => self.superclass(caller.type_id)?,
            _ => return None,
        };
        if created != target.type_id {
            return None;
        }
        let candidates = self.declared_methods(created, target.method.name(), call.arg_count);
        classify(&candidates, target_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify(&[3], 3), Some(Accuracy::Exact));
        assert_eq!(classify(&[3, 4], 3), Some(Accuracy::Potential));
        assert_eq!(classify(&[4], 3), None);
        assert_eq!(classify(&[], 3), None);
    }
}
