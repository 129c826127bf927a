/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Registration surface towards the host's protocol stack.

use std::sync::Arc;

/// An inbound endpoint a protocol stack advertises to the mesh.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProtocolEndpoint {
    pub path: String,
    pub description: String,
}

/// A protocol implementation the host can register at startup.
pub trait ProtocolStack: Send + Sync {
    fn name(&self) -> &str;

    fn endpoints(&self) -> Vec<ProtocolEndpoint>;
}

/// Host-side registry accepting protocol stacks.
pub trait ServerStackHost {
    fn add_server_stack(&mut self, stack: Arc<dyn ProtocolStack>);
}
