// Copyright (c) The tiespath contributors.
// Licensed under the Apache License, Version 2.0.

mod common;
mod plan;
