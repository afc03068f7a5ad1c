//! Shared object space for integration tests

#![allow(dead_code)]

use std::rc::Rc;
use tether_core::{ObjectSpace, Singleton};

/// Payload of a test heap object
#[derive(Debug, PartialEq)]
pub enum Payload {
    Singleton(Singleton),
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
}

/// Owned reference into the test heap; the strong count tracks ownership
pub type Obj = Rc<Payload>;

/// Object space that hands out one shared instance per singleton
pub struct TestSpace {
    singletons: Vec<(Singleton, Obj)>,
}

impl TestSpace {
    pub fn new() -> Self {
        let all = [
            Singleton::None,
            Singleton::False,
            Singleton::True,
            Singleton::ValueError,
            Singleton::TypeError,
            Singleton::BaseObjectType,
            Singleton::TypeType,
            Singleton::LongType,
            Singleton::UnicodeType,
            Singleton::TupleType,
            Singleton::ListType,
        ];
        Self {
            singletons: all
                .iter()
                .map(|which| (*which, Rc::new(Payload::Singleton(*which))))
                .collect(),
        }
    }

    pub fn get(&self, which: Singleton) -> Obj {
        self.singletons
            .iter()
            .find(|(s, _)| *s == which)
            .map(|(_, obj)| Rc::clone(obj))
            .expect("every singleton is preallocated")
    }
}

impl ObjectSpace for TestSpace {
    type Object = Obj;

    fn singleton(&self, which: Singleton) -> Obj {
        self.get(which)
    }

    fn bytes(&self, object: &Obj) -> Option<Vec<u8>> {
        match object.as_ref() {
            Payload::Bytes(data) => Some(data.clone()),
            Payload::Str(s) => Some(s.as_bytes().to_vec()),
            _ => None,
        }
    }
}

pub fn int(value: i64) -> Obj {
    Rc::new(Payload::Int(value))
}

pub fn string(value: &str) -> Obj {
    Rc::new(Payload::Str(value.to_string()))
}
