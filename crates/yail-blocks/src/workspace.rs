//! Workspace: the block graph together with the component tree
//!
//! Component-derived blocks are created here because their sockets and plug
//! types come from the component type, not from the genus.

use serde::{Deserialize, Serialize};

use crate::block::{BlockId, Plug};
use crate::component::ComponentTree;
use crate::error::{ModelError, Result};
use crate::graph::BlockGraph;
use crate::language::{genera, BlockKind, ConnectorKind, LanguageDef, SocketDef};

/// Genus of the root form component.
pub const FORM_TYPE: &str = "Form";

/// Socket label prefix for procedure parameters.
pub const ARG_SOCKET_PREFIX: &str = "arg";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    #[serde(default)]
    pub blocks: BlockGraph,
    #[serde(default)]
    pub components: ComponentTree,
}

impl Workspace {
    /// An empty workspace whose root form is `form_name`.
    pub fn new(form_name: &str) -> Self {
        Self {
            blocks: BlockGraph::new(),
            components: ComponentTree::with_root(form_name, FORM_TYPE),
        }
    }

    pub fn from_json(s: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Add a plain block of the named genus.
    pub fn add_block(&mut self, lang: &LanguageDef, genus: &str, label: &str) -> Result<BlockId> {
        let genus = lang.require_genus(genus)?;
        Ok(self.blocks.add_block(genus, label))
    }

    pub fn add_component(&mut self, name: &str, genus: &str, parent: &str) -> Result<()> {
        self.components.add(name, genus, parent)
    }

    fn register(&mut self, component: &str, block: BlockId) {
        if let Some(c) = self.components.get_mut(component) {
            c.blocks.insert(block);
        }
    }

    fn component_genus(&self, component: &str) -> Result<String> {
        Ok(self.components.require(component)?.genus.clone())
    }

    /// `when Component.Event do ...`
    pub fn component_event(&mut self, lang: &LanguageDef, component: &str, event: &str) -> Result<BlockId> {
        let genus_name = self.component_genus(component)?;
        lang.component_type(&genus_name)
            .and_then(|ty| ty.event(event))
            .ok_or_else(|| ModelError::unknown_member(&genus_name, event))?;
        let genus = lang.require_genus(genera::COMPONENT_EVENT)?;
        let id = self.blocks.add_block_with_sockets(
            genus,
            format!("{}.{}", component, event),
            vec![SocketDef::new("do", ConnectorKind::of("cmd")).command().optional()],
        );
        self.register(component, id);
        Ok(id)
    }

    /// `Component.Property` getter.
    pub fn component_getter(&mut self, lang: &LanguageDef, component: &str, property: &str) -> Result<BlockId> {
        let genus_name = self.component_genus(component)?;
        let ty = lang
            .component_type(&genus_name)
            .and_then(|ty| ty.property(property))
            .map(|p| p.ty.clone())
            .ok_or_else(|| ModelError::unknown_member(&genus_name, property))?;
        let genus = lang.require_genus(genera::COMPONENT_GETTER)?;
        let id = self.blocks.add_block(genus, format!("{}.{}", component, property));
        if let Some(block) = self.blocks.get_mut(id) {
            block.plug = Some(Plug::new(ConnectorKind::of(ty)));
        }
        self.register(component, id);
        Ok(id)
    }

    /// `set Component.Property to ...`
    pub fn component_setter(&mut self, lang: &LanguageDef, component: &str, property: &str) -> Result<BlockId> {
        let genus_name = self.component_genus(component)?;
        let ty = lang
            .component_type(&genus_name)
            .and_then(|ty| ty.property(property))
            .map(|p| p.ty.clone())
            .ok_or_else(|| ModelError::unknown_member(&genus_name, property))?;
        let genus = lang.require_genus(genera::COMPONENT_SETTER)?;
        let id = self.blocks.add_block_with_sockets(
            genus,
            format!("{}.{}", component, property),
            vec![SocketDef::new("to", ConnectorKind::of(ty))],
        );
        self.register(component, id);
        Ok(id)
    }

    /// `call Component.Method ...`; methods with a result get a plug.
    pub fn component_method(&mut self, lang: &LanguageDef, component: &str, method: &str) -> Result<BlockId> {
        let genus_name = self.component_genus(component)?;
        let def = lang
            .component_type(&genus_name)
            .and_then(|ty| ty.method(method))
            .ok_or_else(|| ModelError::unknown_member(&genus_name, method))?;
        let genus = match def.returns {
            Some(_) => lang.require_genus(genera::COMPONENT_METHOD_VALUE)?,
            None => lang.require_genus(genera::COMPONENT_METHOD)?,
        };
        let sockets = def
            .params
            .iter()
            .map(|p| SocketDef::new(p.name.clone(), ConnectorKind::of(p.ty.clone())))
            .collect();
        let returns = def.returns.clone();
        let id = self
            .blocks
            .add_block_with_sockets(genus, format!("{}.{}", component, method), sockets);
        if let (Some(ty), Some(block)) = (returns, self.blocks.get_mut(id)) {
            block.plug = Some(Plug::new(ConnectorKind::of(ty)));
        }
        self.register(component, id);
        Ok(id)
    }

    /// The component itself as a value.
    pub fn component_object(&mut self, lang: &LanguageDef, component: &str) -> Result<BlockId> {
        self.components.require(component)?;
        let genus = lang.require_genus(genera::COMPONENT)?;
        let id = self.blocks.add_block(genus, component);
        self.register(component, id);
        Ok(id)
    }

    /// Generic `ComponentType.Property` getter taking the component in a socket.
    pub fn component_type_getter(&mut self, lang: &LanguageDef, ty: &str, property: &str) -> Result<BlockId> {
        let prop_ty = lang
            .component_type(ty)
            .and_then(|t| t.property(property))
            .map(|p| p.ty.clone())
            .ok_or_else(|| ModelError::unknown_member(ty, property))?;
        let genus = lang.require_genus(genera::COMPONENT_TYPE_GETTER)?;
        let id = self.blocks.add_block(genus, format!("{}.{}", ty, property));
        if let Some(block) = self.blocks.get_mut(id) {
            block.plug = Some(Plug::new(ConnectorKind::of(prop_ty)));
        }
        Ok(id)
    }

    pub fn component_type_setter(&mut self, lang: &LanguageDef, ty: &str, property: &str) -> Result<BlockId> {
        let prop_ty = lang
            .component_type(ty)
            .and_then(|t| t.property(property))
            .map(|p| p.ty.clone())
            .ok_or_else(|| ModelError::unknown_member(ty, property))?;
        let genus = lang.require_genus(genera::COMPONENT_TYPE_SETTER)?;
        Ok(self.blocks.add_block_with_sockets(
            genus,
            format!("{}.{}", ty, property),
            vec![SocketDef::new("to", ConnectorKind::of(prop_ty))],
        ))
    }

    pub fn component_type_method(&mut self, lang: &LanguageDef, ty: &str, method: &str) -> Result<BlockId> {
        let def = lang
            .component_type(ty)
            .and_then(|t| t.method(method))
            .ok_or_else(|| ModelError::unknown_member(ty, method))?;
        let sockets = def
            .params
            .iter()
            .map(|p| SocketDef::new(p.name.clone(), ConnectorKind::of(p.ty.clone())))
            .collect();
        let returns = def.returns.clone();
        let genus = lang.require_genus(genera::COMPONENT_TYPE_METHOD)?;
        let id = self
            .blocks
            .add_block_with_sockets(genus, format!("{}.{}", ty, method), sockets);
        if let (Some(ty), Some(block)) = (returns, self.blocks.get_mut(id)) {
            block.plug = Some(Plug::new(ConnectorKind::of(ty)));
        }
        Ok(id)
    }

    /// Create the event, getter, setter and method blocks of a component,
    /// plus the component object block. Returns them in that order.
    pub fn generate_component_blocks(&mut self, lang: &LanguageDef, component: &str) -> Result<Vec<BlockId>> {
        let genus_name = self.component_genus(component)?;
        let ty = lang
            .component_type(&genus_name)
            .ok_or_else(|| ModelError::UnknownGenus(genus_name.clone()))?;

        let mut created = Vec::new();
        for event in &ty.events {
            created.push(self.component_event(lang, component, &event.name)?);
        }
        for prop in &ty.properties {
            created.push(self.component_getter(lang, component, &prop.name)?);
            created.push(self.component_setter(lang, component, &prop.name)?);
        }
        for method in &ty.methods {
            created.push(self.component_method(lang, component, &method.name)?);
        }
        created.push(self.component_object(lang, component)?);
        tracing::debug!(component, blocks = created.len(), "generated component blocks");
        Ok(created)
    }

    /// A procedure definition whose parameters are argument blocks sitting
    /// in `arg0`, `arg1`, ... sockets.
    pub fn add_procedure(
        &mut self,
        lang: &LanguageDef,
        name: &str,
        params: &[&str],
        with_result: bool,
    ) -> Result<BlockId> {
        let genus = if with_result {
            lang.require_genus(genera::PROCEDURE_WITH_RESULT)?
        } else {
            lang.require_genus(genera::PROCEDURE)?
        };
        let sockets = (0..params.len())
            .map(|i| SocketDef::new(format!("{}{}", ARG_SOCKET_PREFIX, i), ConnectorKind::of("argument")))
            .collect();
        let def = self.blocks.add_block_with_sockets(genus, name, sockets);
        let argument = lang.require_genus(genera::ARGUMENT)?;
        for (i, param) in params.iter().enumerate() {
            let arg = self.blocks.add_block(argument, *param);
            self.blocks
                .connect(def, &format!("{}{}", ARG_SOCKET_PREFIX, i), arg)?;
        }
        Ok(def)
    }

    /// Parameter names of a procedure definition, in socket order.
    pub fn procedure_params(&self, def: BlockId) -> Vec<String> {
        let Some(block) = self.blocks.get(def) else {
            return Vec::new();
        };
        block
            .sockets
            .iter()
            .filter(|s| s.label.starts_with(ARG_SOCKET_PREFIX))
            .filter_map(|s| s.block)
            .filter_map(|id| self.blocks.get(id))
            .map(|b| b.label.clone())
            .collect()
    }

    /// A call site stub for a procedure definition.
    pub fn add_procedure_call(&mut self, lang: &LanguageDef, def: BlockId) -> Result<BlockId> {
        let def_block = self.blocks.require(def)?;
        let kind = lang.require_genus(&def_block.genus)?.kind;
        let genus = match kind {
            BlockKind::ProcedureWithResult => lang.require_genus(genera::CALLER)?,
            _ => lang.require_genus(genera::CALLER_COMMAND)?,
        };
        let sockets = self
            .procedure_params(def)
            .into_iter()
            .map(|p| SocketDef::new(p, ConnectorKind::of("value")))
            .collect();
        self.blocks.create_stub(def, genus, sockets)
    }

    /// Rename a component and relabel every block derived from it.
    ///
    /// Returns the relabelled blocks.
    pub fn rename_component(&mut self, old: &str, new: &str) -> Result<Vec<BlockId>> {
        self.components.rename(old, new)?;
        let owned: Vec<BlockId> = self
            .components
            .get(new)
            .map(|c| c.blocks.iter().copied().collect())
            .unwrap_or_default();

        let prefix = format!("{}.", old);
        let mut relabelled = Vec::new();
        for id in owned {
            let Some(block) = self.blocks.get(id) else {
                continue;
            };
            let label = if block.label == old {
                new.to_string()
            } else if let Some(member) = block.label.strip_prefix(&prefix) {
                format!("{}.{}", new, member)
            } else {
                continue;
            };
            self.blocks.relabel(id, label)?;
            relabelled.push(id);
        }
        tracing::debug!(old, new, blocks = relabelled.len(), "renamed component");
        Ok(relabelled)
    }

    /// Remove a component, its descendants and their derived blocks. Blocks
    /// already deleted by an earlier cascade are skipped.
    pub fn remove_component(&mut self, name: &str) -> Result<Vec<BlockId>> {
        let removed = self.components.remove(name)?;
        let mut deleted = Vec::new();
        for component in removed {
            for id in component.blocks {
                if !self.blocks.contains(id) {
                    continue;
                }
                deleted.extend(self.blocks.remove_block(id)?);
            }
        }
        Ok(deleted)
    }
}
