/// Canonical type values and the interning registry.
///
/// Every type the pipeline touches is an `Rc<Type>` handed out by the
/// registry; two structurally equal types built from the same component
/// handles are the *same* allocation, so later stages compare types with
/// `Rc::ptr_eq` instead of walking structures.
///
/// `User` is a forward-reference placeholder: `user("Pair")` returns the
/// bound struct/union once a `type Pair := …` declaration has registered
/// it, and a canonical placeholder before that. The validator resolves
/// placeholders (deeply, through containers) before comparing.
use std::collections::HashMap;
use std::rc::Rc;

use crate::lexer::TokenKind;

#[derive(Debug)]
pub enum Type {
    Void,
    Bool,
    Int,
    Float,
    String,
    Any,
    Invalid,
    Array(TypeHandle),
    Map(TypeHandle, TypeHandle),
    Function {
        ret: TypeHandle,
        params: Vec<TypeHandle>,
    },
    /// Unresolved reference to a user type by name.
    User(String),
    Struct {
        name: String,
        members: Vec<(String, TypeHandle)>,
    },
    Union {
        name: String,
        alts: Vec<TypeHandle>,
    },
}

pub type TypeHandle = Rc<Type>;

pub struct TypeRegistry {
    composites: Vec<TypeHandle>,
    named: HashMap<String, TypeHandle>,
    placeholders: HashMap<String, TypeHandle>,
    void_ty: TypeHandle,
    bool_ty: TypeHandle,
    int_ty: TypeHandle,
    float_ty: TypeHandle,
    string_ty: TypeHandle,
    any_ty: TypeHandle,
    invalid_ty: TypeHandle,
}

impl TypeRegistry {
    pub fn new() -> Self {
        TypeRegistry {
            composites: Vec::new(),
            named: HashMap::new(),
            placeholders: HashMap::new(),
            void_ty: Rc::new(Type::Void),
            bool_ty: Rc::new(Type::Bool),
            int_ty: Rc::new(Type::Int),
            float_ty: Rc::new(Type::Float),
            string_ty: Rc::new(Type::String),
            any_ty: Rc::new(Type::Any),
            invalid_ty: Rc::new(Type::Invalid),
        }
    }

    pub fn void(&self) -> TypeHandle {
        Rc::clone(&self.void_ty)
    }

    pub fn bool_type(&self) -> TypeHandle {
        Rc::clone(&self.bool_ty)
    }

    pub fn int(&self) -> TypeHandle {
        Rc::clone(&self.int_ty)
    }

    pub fn float(&self) -> TypeHandle {
        Rc::clone(&self.float_ty)
    }

    pub fn string(&self) -> TypeHandle {
        Rc::clone(&self.string_ty)
    }

    pub fn any(&self) -> TypeHandle {
        Rc::clone(&self.any_ty)
    }

    pub fn invalid(&self) -> TypeHandle {
        Rc::clone(&self.invalid_ty)
    }

    /// Primitive type named by a keyword or literal token.
    pub fn from_token(&self, kind: TokenKind) -> TypeHandle {
        match kind {
            TokenKind::Int | TokenKind::IntLiteral => self.int(),
            TokenKind::Float | TokenKind::FloatLiteral => self.float(),
            TokenKind::Bool | TokenKind::True | TokenKind::False => self.bool_type(),
            TokenKind::String | TokenKind::StringLiteral => self.string(),
            TokenKind::Any => self.any(),
            _ => self.invalid(),
        }
    }

    pub fn array(&mut self, element: TypeHandle) -> TypeHandle {
        for existing in &self.composites {
            if let Type::Array(e) = existing.as_ref() {
                if Rc::ptr_eq(e, &element) {
                    return Rc::clone(existing);
                }
            }
        }
        let handle: TypeHandle = Rc::new(Type::Array(element));
        self.composites.push(Rc::clone(&handle));
        handle
    }

    pub fn map(&mut self, key: TypeHandle, value: TypeHandle) -> TypeHandle {
        for existing in &self.composites {
            if let Type::Map(k, v) = existing.as_ref() {
                if Rc::ptr_eq(k, &key) && Rc::ptr_eq(v, &value) {
                    return Rc::clone(existing);
                }
            }
        }
        let handle: TypeHandle = Rc::new(Type::Map(key, value));
        self.composites.push(Rc::clone(&handle));
        handle
    }

    pub fn function(&mut self, ret: TypeHandle, params: Vec<TypeHandle>) -> TypeHandle {
        for existing in &self.composites {
            if let Type::Function { ret: r, params: p } = existing.as_ref() {
                let same_params = p.len() == params.len()
                    && p.iter().zip(params.iter()).all(|(a, b)| Rc::ptr_eq(a, b));
                if Rc::ptr_eq(r, &ret) && same_params {
                    return Rc::clone(existing);
                }
            }
        }
        let handle: TypeHandle = Rc::new(Type::Function { ret, params });
        self.composites.push(Rc::clone(&handle));
        handle
    }

    /// Register a struct type and bind it under its name.
    pub fn struct_type(
        &mut self,
        name: &str,
        members: Vec<(String, TypeHandle)>,
    ) -> TypeHandle {
        let handle: TypeHandle = Rc::new(Type::Struct {
            name: name.to_string(),
            members,
        });
        self.named.insert(name.to_string(), Rc::clone(&handle));
        handle
    }

    /// Register a union type and bind it under its name.
    pub fn union_type(&mut self, name: &str, alts: Vec<TypeHandle>) -> TypeHandle {
        let handle: TypeHandle = Rc::new(Type::Union {
            name: name.to_string(),
            alts,
        });
        self.named.insert(name.to_string(), Rc::clone(&handle));
        handle
    }

    /// Resolve a type name: the bound struct/union if one exists, otherwise
    /// a canonical placeholder for the validator to resolve later.
    pub fn user(&mut self, name: &str) -> TypeHandle {
        if let Some(bound) = self.named.get(name) {
            return Rc::clone(bound);
        }
        if let Some(placeholder) = self.placeholders.get(name) {
            return Rc::clone(placeholder);
        }
        let handle: TypeHandle = Rc::new(Type::User(name.to_string()));
        self.placeholders
            .insert(name.to_string(), Rc::clone(&handle));
        handle
    }

    /// Map a `User` placeholder to its bound type, if any. Non-placeholder
    /// handles pass through.
    pub fn resolve(&self, ty: &TypeHandle) -> TypeHandle {
        if let Type::User(name) = ty.as_ref() {
            if let Some(bound) = self.named.get(name) {
                return Rc::clone(bound);
            }
        }
        Rc::clone(ty)
    }

    /// Deep placeholder resolution: rebuilds containers whose components
    /// resolved to something new, re-interning so identity is preserved.
    /// A placeholder with no binding stays a placeholder; callers report it.
    pub fn canonicalize(&mut self, ty: &TypeHandle) -> TypeHandle {
        match ty.as_ref() {
            Type::User(_) => self.resolve(ty),
            Type::Array(e) => {
                let ce = self.canonicalize(e);
                if Rc::ptr_eq(&ce, e) {
                    Rc::clone(ty)
                } else {
                    self.array(ce)
                }
            }
            Type::Map(k, v) => {
                let ck = self.canonicalize(k);
                let cv = self.canonicalize(v);
                if Rc::ptr_eq(&ck, k) && Rc::ptr_eq(&cv, v) {
                    Rc::clone(ty)
                } else {
                    self.map(ck, cv)
                }
            }
            Type::Function { ret, params } => {
                let cr = self.canonicalize(ret);
                let cp: Vec<TypeHandle> = params.iter().map(|p| self.canonicalize(p)).collect();
                let unchanged = Rc::ptr_eq(&cr, ret)
                    && cp.iter().zip(params.iter()).all(|(a, b)| Rc::ptr_eq(a, b));
                if unchanged {
                    Rc::clone(ty)
                } else {
                    self.function(cr, cp)
                }
            }
            _ => Rc::clone(ty),
        }
    }

    /// Canonical identity after placeholder resolution.
    pub fn same(&self, a: &TypeHandle, b: &TypeHandle) -> bool {
        Rc::ptr_eq(&self.resolve(a), &self.resolve(b))
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn is_numeric(ty: &Type) -> bool {
    matches!(ty, Type::Bool | Type::Int | Type::Float)
}

pub fn is_any(ty: &Type) -> bool {
    matches!(ty, Type::Any)
}

pub fn is_invalid(ty: &Type) -> bool {
    matches!(ty, Type::Invalid)
}

/// Numeric promotion rank: bool < int < float. None for non-numeric types.
pub fn rank(ty: &Type) -> Option<u8> {
    match ty {
        Type::Bool => Some(0),
        Type::Int => Some(1),
        Type::Float => Some(2),
        _ => None,
    }
}

/// Human-readable type name for diagnostics.
pub fn display(ty: &Type) -> String {
    match ty {
        Type::Void => "Void".to_string(),
        Type::Bool => "Bool".to_string(),
        Type::Int => "Int".to_string(),
        Type::Float => "Float".to_string(),
        Type::String => "String".to_string(),
        Type::Any => "Any".to_string(),
        Type::Invalid => "<invalid>".to_string(),
        Type::Array(e) => format!("[{}]", display(e)),
        Type::Map(k, v) => format!("[{}, {}]", display(k), display(v)),
        Type::Function { ret, params } => {
            let ps: Vec<String> = params.iter().map(|p| display(p)).collect();
            format!("({}) -> {}", ps.join(", "), display(ret))
        }
        Type::User(name) => name.clone(),
        Type::Struct { name, .. } => name.clone(),
        Type::Union { name, .. } => name.clone(),
    }
}
